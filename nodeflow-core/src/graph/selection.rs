//! Selections of nodes and the connections between them.

use indexmap::IndexSet;
use tracing::debug;

use super::node::UniqueId;
use super::port::PortRef;
use super::Graph;
use crate::error::Result;

/// An ordered set of nodes plus an ordered set of connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    nodes: IndexSet<UniqueId>,
    connections: IndexSet<(PortRef, PortRef)>,
}

impl Selection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Returns false if it was already selected.
    pub fn insert_node(&mut self, node: UniqueId) -> bool {
        self.nodes.insert(node)
    }

    /// Add a connection. Returns false if it was already selected.
    pub fn insert_connection(&mut self, output: PortRef, input: PortRef) -> bool {
        self.connections.insert((output, input))
    }

    pub fn contains_node(&self, node: UniqueId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_connection(&self, output: PortRef, input: PortRef) -> bool {
        self.connections.contains(&(output, input))
    }

    /// Selected nodes, in selection order.
    pub fn nodes(&self) -> impl Iterator<Item = UniqueId> + '_ {
        self.nodes.iter().copied()
    }

    /// Selected connections as `(output, input)`, in selection order.
    pub fn connections(&self) -> impl Iterator<Item = (PortRef, PortRef)> + '_ {
        self.connections.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connections.is_empty()
    }
}

impl Graph {
    /// Select `nodes` together with every connection running between two of
    /// them.
    pub fn select_with_connections<I>(&self, nodes: I) -> Result<Selection>
    where
        I: IntoIterator<Item = UniqueId>,
    {
        let mut selection = Selection::new();
        for node in nodes {
            self.node(node)?;
            selection.insert_node(node);
        }

        let mut parents = IndexSet::new();
        for node in selection.nodes() {
            if let Some(parent) = self.node(node)?.parent {
                parents.insert(parent);
            }
        }
        for parent in parents {
            for (output, input) in self.connections(parent)?.iter() {
                if selection.contains_node(output.node) && selection.contains_node(input.node) {
                    selection.insert_connection(output, input);
                }
            }
        }
        Ok(selection)
    }

    /// Disconnect the selected connections, then remove the selected nodes.
    /// Entries that no longer exist are skipped.
    pub fn remove_selection(&mut self, selection: &Selection) -> Result<()> {
        debug!(
            nodes = selection.nodes.len(),
            connections = selection.connections.len(),
            "removing selection"
        );

        for (output, input) in selection.connections() {
            if self.contains(input.node) && self.source_of(input) == Some(output) {
                self.disconnect_edge(output, input);
            }
        }
        for node in selection.nodes() {
            if self.contains(node) {
                self.remove_node(node)?;
            }
        }
        Ok(())
    }
}
