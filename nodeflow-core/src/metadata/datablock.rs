//! Per-instance attribute storage.

use super::node_type::Metadata;
use crate::value::{Data, Value};

/// One value slot per attribute of a node instance.
///
/// Seeded from the metadata defaults. Slots of untyped attributes start null
/// and receive a value when their port is first connected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datablock {
    values: Vec<Value>,
}

impl Datablock {
    /// Build a datablock holding the defaults of every attribute.
    pub fn new(meta: &Metadata) -> Self {
        Self {
            values: meta.attrs().iter().map(|attr| attr.default_value()).collect(),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value in slot `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// The payload in slot `index`, if it is a `T`.
    pub fn get_as<T: Data>(&self, index: usize) -> Option<&T> {
        self.values.get(index).and_then(Value::downcast_ref::<T>)
    }

    /// Replace the value in slot `index`. Returns false when out of range.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Reset slot `index` to the attribute's default.
    pub fn reset(&mut self, index: usize, meta: &Metadata) {
        if let (Some(slot), Some(attr)) = (self.values.get_mut(index), meta.attr(index)) {
            *slot = attr.default_value();
        }
    }

    /// All slots, in attribute order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Value {
        self.values.remove(index)
    }

    /// Rearrange the slots so that `order[new] == old`.
    pub(crate) fn reorder(&mut self, order: &[usize]) {
        self.values = order.iter().map(|&old| self.values[old].clone()).collect();
    }
}
