//! Node Type Descriptor
//!
//! [`Metadata`] declares everything instances of a node type share: the
//! ordered attribute list, which inputs influence which outputs, and the
//! compute callback.
//!
//! # Declaring a Node Type
//!
//! ```rust,ignore
//! let mut meta = Metadata::new("add");
//! let a = meta.add_input("a", 0.0f32);
//! let b = meta.add_input("b", 0.0f32);
//! let out = meta.add_output("out", 0.0f32);
//! meta.add_influence(&a, &out);
//! meta.add_influence(&b, &out);
//! meta.set_compute(move |values| {
//!     let sum = values.get(&a)? + values.get(&b)?;
//!     values.set(&out, sum)?;
//!     Ok(State::new())
//! });
//! let handle = MetadataHandle::new(meta);
//! ```
//!
//! The influence relation drives both dirty propagation and evaluation: an
//! output is recomputed only when one of the inputs influencing it changed,
//! and only those inputs are pulled before its compute runs.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::attr::{Attr, AttrFlags, Category, InAttr, OutAttr};
use crate::error::ComputeError;
use crate::state::State;
use crate::value::{Data, TypeTag, Value, Void};
use crate::values::Values;

/// Compute callback of a node type.
pub type ComputeFn = Arc<dyn Fn(&mut Values<'_>) -> Result<State, ComputeError> + Send + Sync>;

/// Shared handle to a node type. All instances of a type hold the same handle.
pub type MetadataHandle = Arc<Metadata>;

/// Descriptor of a node type.
#[derive(Clone)]
pub struct Metadata {
    type_name: String,
    attrs: Vec<Attr>,
    /// For an input: the outputs it influences. For an output: the inputs
    /// influencing it.
    relations: Vec<SmallVec<[usize; 4]>>,
    compute: Option<ComputeFn>,
}

impl Metadata {
    /// Create an empty descriptor.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attrs: Vec::new(),
            relations: Vec::new(),
            compute: None,
        }
    }

    /// The node type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Append an attribute and return its index.
    pub fn add_attribute(&mut self, attr: Attr) -> usize {
        debug_assert!(
            self.attr_index(attr.name()).is_none(),
            "duplicate attribute '{}' on '{}'",
            attr.name(),
            self.type_name
        );
        self.attrs.push(attr);
        self.relations.push(SmallVec::new());
        self.attrs.len() - 1
    }

    /// Declare a typed input.
    pub fn add_input<T: Data>(&mut self, name: impl Into<String>, default: T) -> InAttr<T> {
        self.add_input_with_flags(name, default, AttrFlags::default())
    }

    /// Declare a typed input with non-default flags, e.g. one that is left
    /// out of documents.
    pub fn add_input_with_flags<T: Data>(
        &mut self,
        name: impl Into<String>,
        default: T,
        flags: AttrFlags,
    ) -> InAttr<T> {
        let attr = Attr::new(name, Category::Input, TypeTag::of::<T>(), move || {
            Value::new(default.clone())
        });
        InAttr::new(self.add_attribute(attr.with_flags(flags)))
    }

    /// Declare a typed output.
    pub fn add_output<T: Data>(&mut self, name: impl Into<String>, default: T) -> OutAttr<T> {
        let attr = Attr::new(name, Category::Output, TypeTag::of::<T>(), move || {
            Value::new(default.clone())
        });
        OutAttr::new(self.add_attribute(attr))
    }

    /// Declare an untyped input. Its type is resolved from its connection.
    pub fn add_void_input(&mut self, name: impl Into<String>) -> InAttr<Void> {
        InAttr::new(self.add_attribute(Attr::void(name, Category::Input)))
    }

    /// Declare an untyped output. Its type is resolved from its connections.
    pub fn add_void_output(&mut self, name: impl Into<String>) -> OutAttr<Void> {
        OutAttr::new(self.add_attribute(Attr::void(name, Category::Output)))
    }

    /// Declare that `input` affects the value of `output`.
    pub fn add_influence<A, B>(&mut self, input: &InAttr<A>, output: &OutAttr<B>) {
        self.add_influence_index(input.index(), output.index());
    }

    pub(crate) fn add_influence_index(&mut self, input: usize, output: usize) {
        debug_assert_eq!(self.attrs[input].category(), Category::Input);
        debug_assert_eq!(self.attrs[output].category(), Category::Output);

        if !self.relations[input].contains(&output) {
            self.relations[input].push(output);
            self.relations[output].push(input);
        }
    }

    /// Install the compute callback.
    pub fn set_compute<F>(&mut self, compute: F)
    where
        F: Fn(&mut Values<'_>) -> Result<State, ComputeError> + Send + Sync + 'static,
    {
        self.compute = Some(Arc::new(compute));
    }

    pub(crate) fn compute(&self) -> Option<ComputeFn> {
        self.compute.clone()
    }

    /// Whether a compute callback is installed.
    pub fn has_compute(&self) -> bool {
        self.compute.is_some()
    }

    /// All attributes, in declaration order.
    pub fn attrs(&self) -> &[Attr] {
        &self.attrs
    }

    /// The attribute at `index`.
    pub fn attr(&self, index: usize) -> Option<&Attr> {
        self.attrs.get(index)
    }

    /// Index of the attribute called `name`.
    pub fn attr_index(&self, name: &str) -> Option<usize> {
        self.attrs.iter().position(|attr| attr.name() == name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Whether the type declares no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Outputs influenced by the input at `input`.
    pub fn influences(&self, input: usize) -> &[usize] {
        match self.attrs.get(input) {
            Some(attr) if attr.category() == Category::Input => &self.relations[input],
            _ => &[],
        }
    }

    /// Inputs influencing the output at `output`.
    pub fn influenced_by(&self, output: usize) -> &[usize] {
        match self.attrs.get(output) {
            Some(attr) if attr.category() == Category::Output => &self.relations[output],
            _ => &[],
        }
    }

    pub(crate) fn rename_attribute(&mut self, index: usize, name: &str) {
        if let Some(attr) = self.attrs.get_mut(index) {
            attr.set_name(name);
        }
    }

    /// Remove the attribute at `index`, shifting later indices down.
    pub(crate) fn remove_attribute(&mut self, index: usize) -> Attr {
        let attr = self.attrs.remove(index);
        self.relations.remove(index);
        for related in &mut self.relations {
            related.retain(|other| *other != index);
            for other in related.iter_mut() {
                if *other > index {
                    *other -= 1;
                }
            }
        }
        attr
    }

    /// Rearrange the attributes so that `order[new] == old`.
    pub(crate) fn reorder_attributes(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.attrs.len());

        let mut moved_to = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            moved_to[old] = new;
        }

        self.attrs = order.iter().map(|&old| self.attrs[old].clone()).collect();
        self.relations = order
            .iter()
            .map(|&old| self.relations[old].iter().map(|&other| moved_to[other]).collect())
            .collect();
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("type_name", &self.type_name)
            .field("attrs", &self.attrs)
            .field("has_compute", &self.has_compute())
            .finish()
    }
}
