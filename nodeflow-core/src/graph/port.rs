//! Ports
//!
//! A port is the runtime side of one attribute on one node instance. It is
//! addressed by a [`PortRef`] (node id plus attribute index) and owns:
//!
//! - a dirty flag: the held value is stale and must be recomputed before it
//!   is read (outputs start dirty, unconnected inputs start clean)
//! - an optional outgoing link and an optional incoming link, used to mirror
//!   ports across a network boundary
//!
//! # Void Ports
//!
//! A port whose attribute is declared void has no type of its own. Its type is
//! resolved live from whatever it is wired to: an input takes the type of its
//! source, an output the type of any of its sinks, and a linked port the type
//! of its link source. Once every connection is gone it is void again.

use std::fmt;

use smallvec::SmallVec;

use super::node::UniqueId;
use super::Graph;
use crate::error::{Error, Result};
use crate::events::GraphEvent;
use crate::metadata::{Attr, Category};
use crate::value::{Data, TypeTag, Value};

/// Address of one port: a node and the index of one of its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    /// The node owning the port.
    pub node: UniqueId,
    /// Attribute index within the node's metadata.
    pub index: usize,
}

impl PortRef {
    /// Address port `index` of `node`.
    pub fn new(node: UniqueId, index: usize) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.index)
    }
}

/// Per-instance runtime state of a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PortState {
    pub(crate) dirty: bool,
    /// Port mirroring this one (value flows from here to there).
    pub(crate) link_to: Option<PortRef>,
    /// Port this one mirrors.
    pub(crate) linked_from: Option<PortRef>,
}

impl PortState {
    pub(crate) fn new(category: Category) -> Self {
        Self {
            dirty: category == Category::Output,
            link_to: None,
            linked_from: None,
        }
    }
}

/// Snapshot of a port, as exposed to clients and documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Attribute index.
    pub index: usize,
    /// Attribute name.
    pub name: String,
    /// Input or output.
    pub category: Category,
    /// Resolved type; void for an unresolved untyped port.
    pub value_type: TypeTag,
    /// Whether the held value is stale.
    pub dirty: bool,
}

impl Graph {
    /// Look up a port by attribute name.
    pub fn port(&self, node: UniqueId, name: &str) -> Result<PortRef> {
        let data = self.node(node)?;
        data.metadata
            .attr_index(name)
            .map(|index| PortRef::new(node, index))
            .ok_or_else(|| Error::PortNotFound {
                node,
                port: name.to_string(),
            })
    }

    /// Describe every port of a node, in attribute order.
    pub fn ports(&self, node: UniqueId) -> Result<Vec<PortInfo>> {
        let count = self.node(node)?.ports.len();
        (0..count)
            .map(|index| self.port_info(PortRef::new(node, index)))
            .collect()
    }

    /// Describe one port.
    pub fn port_info(&self, port: PortRef) -> Result<PortInfo> {
        let attr = self.attr(port)?;
        Ok(PortInfo {
            index: port.index,
            name: attr.name().to_string(),
            category: attr.category(),
            value_type: self.resolve_type(port),
            dirty: self.port_state(port).dirty,
        })
    }

    /// Attribute name of a port.
    pub fn port_name(&self, port: PortRef) -> Result<&str> {
        Ok(self.attr(port)?.name())
    }

    /// Direction of a port.
    pub fn category(&self, port: PortRef) -> Result<Category> {
        Ok(self.attr(port)?.category())
    }

    /// Whether the port's held value is stale.
    pub fn is_dirty(&self, port: PortRef) -> Result<bool> {
        self.attr(port)?;
        Ok(self.port_state(port).dirty)
    }

    /// Resolved type of a port. Void when an untyped port is not wired.
    pub fn port_type(&self, port: PortRef) -> Result<TypeTag> {
        self.attr(port)?;
        Ok(self.resolve_type(port))
    }

    /// Source of an input port.
    pub fn connected_from(&self, input: PortRef) -> Result<Option<PortRef>> {
        self.attr(input)?;
        Ok(self.source_of(input))
    }

    /// Inputs fed by an output port.
    pub fn connected_to(&self, output: PortRef) -> Result<Vec<PortRef>> {
        self.attr(output)?;
        Ok(self.sinks_of(output).into_vec())
    }

    /// Whether the port is an end of any connection.
    pub fn is_connected(&self, port: PortRef) -> Result<bool> {
        self.attr(port)?;
        Ok(self
            .enclosing_connections(port.node)
            .map_or(false, |connections| connections.is_connected(port)))
    }

    /// The value currently held by a port, without evaluating anything.
    pub fn held_value(&self, port: PortRef) -> Result<&Value> {
        self.attr(port)?;
        self.node(port.node)?
            .datablock
            .get(port.index)
            .ok_or_else(|| Error::PortNotFound {
                node: port.node,
                port: port.index.to_string(),
            })
    }

    /// Read a port's value, evaluating whatever it depends on first.
    pub fn get_value(&mut self, port: PortRef) -> Result<Value> {
        self.attr(port)?;
        self.pull(port, 0)
    }

    /// Read a port's value as `T`, evaluating whatever it depends on first.
    pub fn get<T: Data>(&mut self, port: PortRef) -> Result<T> {
        let value_type = self.port_type(port)?;
        if value_type.is_void() {
            return Err(Error::UnconnectedUntypedRead { port });
        }
        if !value_type.is::<T>() {
            return Err(Error::TypeMismatch {
                expected: value_type.name().to_string(),
                found: T::TYPE_NAME.to_string(),
            });
        }

        let value = self.pull(port, 0)?;
        value.downcast_ref::<T>().cloned().ok_or_else(|| Error::TypeMismatch {
            expected: T::TYPE_NAME.to_string(),
            found: value.type_tag().name().to_string(),
        })
    }

    /// Set the value of an unconnected input.
    pub fn set<T: Data>(&mut self, port: PortRef, value: T) -> Result<()> {
        self.set_value(port, Value::new(value))
    }

    /// Set the value of an unconnected input and dirty everything depending
    /// on it. Setting the value already held changes nothing.
    pub fn set_value(&mut self, port: PortRef, value: Value) -> Result<()> {
        if self.attr(port)?.category() != Category::Input {
            return Err(Error::InvalidDirection { port });
        }
        if self.source_of(port).is_some() {
            return Err(Error::AlreadyConnected { input: port });
        }

        let value_type = self.resolve_type(port);
        if value_type.is_void() {
            return Err(Error::UnconnectedUntypedRead { port });
        }
        if value.type_tag() != value_type {
            return Err(Error::TypeMismatch {
                expected: value_type.name().to_string(),
                found: value.type_tag().name().to_string(),
            });
        }

        let was_dirty = self.port_state(port).dirty;
        if !was_dirty && self.held(port) == &value {
            return Ok(());
        }

        self.store(port, value);
        if was_dirty {
            self.port_state_mut(port).dirty = false;
            self.notifiers.emit(GraphEvent::FlagsChanged(port));
        }
        self.mark_as_dirty(port, true);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Crate-internal accessors. Callers have validated `port` already.
    // ------------------------------------------------------------------------

    /// Validate a port and return its attribute.
    pub(crate) fn attr(&self, port: PortRef) -> Result<&Attr> {
        self.node(port.node)?
            .metadata
            .attr(port.index)
            .ok_or_else(|| Error::PortNotFound {
                node: port.node,
                port: port.index.to_string(),
            })
    }

    pub(crate) fn attr_unchecked(&self, port: PortRef) -> &Attr {
        &self.nodes[&port.node].metadata.attrs()[port.index]
    }

    pub(crate) fn port_state(&self, port: PortRef) -> &PortState {
        &self.nodes[&port.node].ports[port.index]
    }

    pub(crate) fn port_state_mut(&mut self, port: PortRef) -> &mut PortState {
        &mut self.nodes.get_mut(&port.node).expect("port of a live node").ports[port.index]
    }

    pub(crate) fn held(&self, port: PortRef) -> &Value {
        &self.nodes[&port.node].datablock.values()[port.index]
    }

    /// Replace the held value and report the change.
    pub(crate) fn store(&mut self, port: PortRef, value: Value) {
        if let Some(node) = self.nodes.get_mut(&port.node) {
            node.datablock.set(port.index, value);
        }
        self.notifiers.emit(GraphEvent::ValueChanged(port));
    }

    pub(crate) fn source_of(&self, input: PortRef) -> Option<PortRef> {
        self.enclosing_connections(input.node)
            .and_then(|connections| connections.connected_from(input))
    }

    pub(crate) fn sinks_of(&self, output: PortRef) -> SmallVec<[PortRef; 4]> {
        self.enclosing_connections(output.node)
            .map(|connections| SmallVec::from_slice(connections.connected_to(output)))
            .unwrap_or_default()
    }

    pub(crate) fn resolve_type(&self, port: PortRef) -> TypeTag {
        let mut visited = SmallVec::<[PortRef; 8]>::new();
        self.resolve_type_from(port, &mut visited)
    }

    fn resolve_type_from(&self, port: PortRef, visited: &mut SmallVec<[PortRef; 8]>) -> TypeTag {
        let attr = self.attr_unchecked(port);
        if !attr.is_void() {
            return attr.value_type();
        }
        if visited.contains(&port) {
            return TypeTag::void();
        }
        visited.push(port);

        if let Some(source) = self.port_state(port).linked_from {
            let value_type = self.resolve_type_from(source, visited);
            if !value_type.is_void() {
                return value_type;
            }
        }

        match attr.category() {
            Category::Input => self
                .source_of(port)
                .map_or_else(TypeTag::void, |source| self.resolve_type_from(source, visited)),
            Category::Output => self
                .sinks_of(port)
                .into_iter()
                .map(|sink| self.resolve_type_from(sink, visited))
                .find(|value_type| !value_type.is_void())
                .unwrap_or_else(TypeTag::void),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::network::{input_metadata, output_metadata};
    use super::super::test_support::*;
    use super::*;
    use crate::metadata::MetadataHandle;
    use std::sync::{Arc, Mutex};

    #[test]
    fn void_ports_resolve_through_links() {
        let input = MetadataHandle::new(input_metadata());
        let output = MetadataHandle::new(output_metadata());
        let mut graph = Graph::new();
        let net = graph.add_network(graph.root(), "net").unwrap();
        let pseudo_in = graph.add_node(net, &input, "in").unwrap();
        let pseudo_out = graph.add_node(net, &output, "out").unwrap();
        let adder = graph.add_node(net, &add(), "add").unwrap();

        let data_out = graph.port(pseudo_in, "data").unwrap();
        let data_in = graph.port(pseudo_out, "data").unwrap();
        assert!(graph.port_type(data_out).unwrap().is_void());

        graph.connect(data_out, graph.port(adder, "a").unwrap()).unwrap();
        graph.connect(graph.port(adder, "out").unwrap(), data_in).unwrap();

        // The pseudo output is typed by its sink and mirrors the boundary.
        assert_eq!(graph.port_type(data_out).unwrap(), TypeTag::of::<f32>());
        assert_eq!(graph.port_state(data_out).linked_from, Some(PortRef::new(net, 0)));
        assert_eq!(graph.port_type(data_in).unwrap(), TypeTag::of::<f32>());
        assert_eq!(graph.port_type(PortRef::new(net, 1)).unwrap(), TypeTag::of::<f32>());
    }

    #[test]
    fn link_loops_resolve_to_void() {
        let mut graph = Graph::new();
        let root = graph.root();
        let first = graph.add_node(root, &passthrough(), "first").unwrap();
        let second = graph.add_node(root, &passthrough(), "second").unwrap();
        let out = graph.port(first, "out").unwrap();
        let input = graph.port(second, "in").unwrap();

        graph.port_state_mut(out).linked_from = Some(input);
        graph.port_state_mut(input).linked_from = Some(out);

        assert!(graph.resolve_type(out).is_void());
        assert!(graph.resolve_type(input).is_void());
    }

    #[test]
    fn setting_the_held_value_is_silent() {
        let mut graph = Graph::new();
        let node = graph.add_node(graph.root(), &add(), "n").unwrap();
        let a = graph.port(node, "a").unwrap();
        let out = graph.port(node, "out").unwrap();
        graph.set(a, 2.0f32).unwrap();
        graph.get::<f32>(out).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        graph.subscribe(move |event| events_clone.lock().unwrap().push(event.clone()));

        graph.set(a, 2.0f32).unwrap();
        assert!(events.lock().unwrap().is_empty());
        assert!(!graph.is_dirty(out).unwrap());

        graph.set(a, 3.0f32).unwrap();
        assert!(events.lock().unwrap().contains(&GraphEvent::ValueChanged(a)));
        assert!(events.lock().unwrap().contains(&GraphEvent::FlagsChanged(out)));
        assert!(!graph.is_dirty(a).unwrap());
        assert!(graph.is_dirty(out).unwrap());
    }

    #[test]
    fn setting_a_dirty_input_cleans_it() {
        let mut graph = Graph::new();
        let root = graph.root();
        let x = graph.add_node(root, &add(), "x").unwrap();
        let y = graph.add_node(root, &add(), "y").unwrap();
        let output = graph.port(x, "out").unwrap();
        let input = graph.port(y, "a").unwrap();
        graph.connect(output, input).unwrap();
        graph.disconnect(output, input).unwrap();
        assert!(graph.is_dirty(input).unwrap());

        // Same value as held, but the stale flag still has to go.
        let held = graph.held_value(input).unwrap().clone();
        graph.set_value(input, held).unwrap();
        assert!(!graph.is_dirty(input).unwrap());
    }

    #[test]
    fn reads_are_type_checked() {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph.add_node(root, &add(), "n").unwrap();
        let pass = graph.add_node(root, &passthrough(), "pass").unwrap();

        assert!(matches!(
            graph.get::<i32>(graph.port(node, "out").unwrap()),
            Err(Error::TypeMismatch { .. })
        ));
        let untyped = graph.port(pass, "in").unwrap();
        assert_eq!(
            graph.get::<f32>(untyped),
            Err(Error::UnconnectedUntypedRead { port: untyped })
        );
        assert_eq!(
            graph.set(untyped, 1.0f32),
            Err(Error::UnconnectedUntypedRead { port: untyped })
        );
    }
}
