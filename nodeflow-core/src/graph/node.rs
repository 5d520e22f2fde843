//! Graph Nodes
//!
//! This module defines the records that live in the graph arena: one
//! [`NodeData`] per node instance, addressed by its [`UniqueId`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::network::NetworkData;
use super::port::PortState;
use crate::metadata::{Datablock, MetadataHandle};
use crate::state::State;
use crate::value::Value;

static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-wide identity of a node.
///
/// Ids are never reused within a process, so external references (undo
/// stacks, editors, documents) can hold them instead of pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueId(u64);

impl UniqueId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Make sure ids generated from now on are greater than `id`.
    pub fn reserve(id: u64) {
        COUNTER.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }
}

impl Default for UniqueId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for UniqueId {
    /// Rebuild an id, e.g. when restoring a node removed by an undo step.
    /// Ids generated afterwards are guaranteed not to collide with it.
    fn from(id: u64) -> Self {
        Self::reserve(id);
        Self(id)
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A leaf node computed by its metadata's callback.
    Node,

    /// A node containing other nodes. Its ports mirror the input and output
    /// pseudo-nodes wired inside it.
    Network,
}

/// Optional parts of a node supplied at creation.
#[derive(Debug, Default)]
pub struct NodeOptions {
    /// Opaque, client-owned data stored with the node.
    pub blind_data: Option<Value>,
    /// Initial attribute values. Must have one slot per attribute.
    pub datablock: Option<Datablock>,
    /// Reuse a known id instead of generating one.
    pub id: Option<UniqueId>,
}

/// A node in the graph arena.
pub(crate) struct NodeData {
    pub(crate) name: String,
    /// Enclosing network. `None` only for the root.
    pub(crate) parent: Option<UniqueId>,
    pub(crate) metadata: MetadataHandle,
    pub(crate) datablock: Datablock,
    pub(crate) ports: Vec<PortState>,
    pub(crate) state: State,
    pub(crate) blind_data: Value,
    pub(crate) network: Option<NetworkData>,
}

impl NodeData {
    pub(crate) fn new(
        name: String,
        parent: Option<UniqueId>,
        metadata: MetadataHandle,
        datablock: Datablock,
        network: Option<NetworkData>,
    ) -> Self {
        let ports = metadata
            .attrs()
            .iter()
            .map(|attr| PortState::new(attr.category()))
            .collect();

        Self {
            name,
            parent,
            metadata,
            datablock,
            ports,
            state: State::new(),
            blind_data: Value::null(),
            network,
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        if self.network.is_some() {
            NodeKind::Network
        } else {
            NodeKind::Node
        }
    }
}
