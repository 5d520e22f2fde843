//! Compute Callback Facade
//!
//! A compute callback receives a [`Values`] bound to the node being
//! evaluated. It can read the node's inputs (pulling them if needed) and
//! write its outputs, and nothing else. The graph structure is out of reach
//! while a compute runs.

use crate::error::{Error, Result};
use crate::graph::{Graph, PortRef, UniqueId};
use crate::metadata::{Category, InAttr, OutAttr};
use crate::value::{Data, TypeTag, Value};

/// Access to one node's values during its compute.
pub struct Values<'g> {
    graph: &'g mut Graph,
    node: UniqueId,
    output: usize,
    depth: usize,
}

impl<'g> Values<'g> {
    pub(crate) fn new(graph: &'g mut Graph, node: UniqueId, output: usize, depth: usize) -> Self {
        Self {
            graph,
            node,
            output,
            depth,
        }
    }

    /// The node being computed.
    pub fn node(&self) -> UniqueId {
        self.node
    }

    /// Index of the output whose refresh triggered this compute.
    pub fn output(&self) -> usize {
        self.output
    }

    /// Whether this compute was triggered for `attr`. Nodes with expensive,
    /// independent outputs use it to compute only what was asked for.
    pub fn is_computing<T>(&self, attr: &OutAttr<T>) -> bool {
        attr.index() == self.output
    }

    /// Read a typed input.
    pub fn get<T: Data>(&mut self, attr: &InAttr<T>) -> Result<T> {
        let value = self.get_value(attr.index())?;
        value.downcast_ref::<T>().cloned().ok_or_else(|| Error::TypeMismatch {
            expected: T::TYPE_NAME.to_string(),
            found: value.type_tag().name().to_string(),
        })
    }

    /// Read any attribute of the node, type-erased. Inputs are refreshed
    /// first; outputs return what they currently hold.
    pub fn get_value(&mut self, index: usize) -> Result<Value> {
        let port = self.port(index)?;
        if self.graph.resolve_type(port).is_void() {
            return Err(Error::UnconnectedUntypedRead { port });
        }
        match self.graph.attr_unchecked(port).category() {
            Category::Input => self.graph.pull(port, self.depth),
            Category::Output => Ok(self.graph.held(port).clone()),
        }
    }

    /// Write a typed output.
    pub fn set<T: Data>(&mut self, attr: &OutAttr<T>, value: T) -> Result<()> {
        self.set_value(attr.index(), Value::new(value))
    }

    /// Write an output, type-erased. An untyped output that is not wired
    /// to anything accepts a value of any type.
    pub fn set_value(&mut self, index: usize, value: Value) -> Result<()> {
        let port = self.port(index)?;
        if self.graph.attr_unchecked(port).category() != Category::Output {
            return Err(Error::InvalidDirection { port });
        }

        let value_type = self.graph.resolve_type(port);
        if !value_type.is_void() && value.type_tag() != value_type {
            return Err(Error::TypeMismatch {
                expected: value_type.name().to_string(),
                found: value.type_tag().name().to_string(),
            });
        }

        self.graph.store(port, value);
        Ok(())
    }

    /// Resolved type of an attribute of the node.
    pub fn value_type(&self, index: usize) -> Result<TypeTag> {
        let port = self.port(index)?;
        Ok(self.graph.resolve_type(port))
    }

    /// Blind data of the node as `T`, if it holds a `T`.
    pub fn blind_data<T: Data>(&self) -> Option<&T> {
        self.graph.blind_data::<T>(self.node).ok().flatten()
    }

    fn port(&self, index: usize) -> Result<PortRef> {
        let port = PortRef::new(self.node, index);
        self.graph.attr(port)?;
        Ok(port)
    }
}
