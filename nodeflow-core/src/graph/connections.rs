//! Connection Store
//!
//! Each network owns one [`Connections`] store holding the edges between its
//! direct children. An edge runs from an output port to an input port; an
//! output may feed any number of inputs, but an input has at most one source.
//!
//! Edges are kept in insertion order, which is also the order documents list
//! them in.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::node::UniqueId;
use super::port::PortRef;

/// Edges between the children of one network.
#[derive(Debug, Clone, Default)]
pub struct Connections {
    /// Input port to its source output, in insertion order.
    by_input: IndexMap<PortRef, PortRef>,
    /// Output port to the inputs it feeds.
    by_output: HashMap<PortRef, SmallVec<[PortRef; 4]>>,
}

impl Connections {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, output: PortRef, input: PortRef) {
        debug_assert!(!self.by_input.contains_key(&input));

        self.by_input.insert(input, output);
        self.by_output.entry(output).or_default().push(input);
    }

    pub(crate) fn remove(&mut self, output: PortRef, input: PortRef) -> bool {
        if self.by_input.get(&input) != Some(&output) {
            return false;
        }

        self.by_input.shift_remove(&input);
        if let Some(inputs) = self.by_output.get_mut(&output) {
            inputs.retain(|port| *port != input);
            if inputs.is_empty() {
                self.by_output.remove(&output);
            }
        }
        true
    }

    /// The source of an input port.
    pub fn connected_from(&self, input: PortRef) -> Option<PortRef> {
        self.by_input.get(&input).copied()
    }

    /// The inputs fed by an output port, in connection order.
    pub fn connected_to(&self, output: PortRef) -> &[PortRef] {
        self.by_output
            .get(&output)
            .map(|inputs| inputs.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the port is an end of any edge.
    pub fn is_connected(&self, port: PortRef) -> bool {
        self.by_input.contains_key(&port) || self.by_output.contains_key(&port)
    }

    /// Whether this exact edge exists.
    pub fn contains(&self, output: PortRef, input: PortRef) -> bool {
        self.by_input.get(&input) == Some(&output)
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.by_input.len()
    }

    /// Whether there are no edges.
    pub fn is_empty(&self) -> bool {
        self.by_input.is_empty()
    }

    /// All edges as `(output, input)` pairs, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (PortRef, PortRef)> + '_ {
        self.by_input.iter().map(|(input, output)| (*output, *input))
    }

    /// Edges with either end on `node`, in insertion order.
    pub(crate) fn edges_of(&self, node: UniqueId) -> Vec<(PortRef, PortRef)> {
        self.iter()
            .filter(|(output, input)| output.node == node || input.node == node)
            .collect()
    }

    /// Shift port indices of `node` above `removed` down by one, after the
    /// attribute at `removed` was deleted. No edge may use `removed` itself.
    pub(crate) fn shift_ports(&mut self, node: UniqueId, removed: usize) {
        let shift = |port: PortRef| {
            if port.node == node && port.index > removed {
                PortRef::new(port.node, port.index - 1)
            } else {
                port
            }
        };

        let edges: Vec<_> = self.iter().collect();
        self.by_input.clear();
        self.by_output.clear();
        for (output, input) in edges {
            debug_assert!(!(output.node == node && output.index == removed));
            debug_assert!(!(input.node == node && input.index == removed));
            self.add(shift(output), shift(input));
        }
    }

    /// Move port indices of `node` to `moved_to[old]`, after its attributes
    /// were reordered.
    pub(crate) fn remap_ports(&mut self, node: UniqueId, moved_to: &[usize]) {
        let remap = |port: PortRef| {
            if port.node == node {
                PortRef::new(node, moved_to[port.index])
            } else {
                port
            }
        };

        let edges: Vec<_> = self.iter().collect();
        self.by_input.clear();
        self.by_output.clear();
        for (output, input) in edges {
            self.add(remap(output), remap(input));
        }
    }
}
