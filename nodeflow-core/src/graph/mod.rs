//! Dataflow Graph
//!
//! This module implements the node graph and its incremental evaluation.
//!
//! # Overview
//!
//! A [`Graph`] is a tree of networks whose leaves are nodes:
//!
//! - Every node is an instance of a node type ([`Metadata`]) and has one
//!   port per attribute of that type.
//! - A network is a node that contains other nodes plus the connections
//!   between them. The graph itself is the root network.
//! - Connections run from an output port to an input port of two nodes in
//!   the same network.
//!
//! Evaluation is lazy. Changing an input only marks the ports that depend on
//! it as dirty; nothing is computed until a dirty port is read. Reading a
//! port pulls exactly the dirty ports it depends on, recursively, and runs
//! each affected compute callback once.
//!
//! # Design Decisions
//!
//! 1. All nodes of all nested networks live in one arena keyed by
//!    [`UniqueId`], and ports are addressed by `(node, index)` pairs. Nothing
//!    holds a pointer into the arena, so ids stay valid across rebuilds.
//!
//! 2. Every mutation goes through `&mut Graph`. Compute callbacks only see a
//!    [`Values`](crate::values::Values) facade for their own node, so they
//!    cannot change the graph structure while it is being evaluated.
//!
//! 3. Structural errors are detected before anything is modified; a failed
//!    call leaves the graph as it was.
//!
//! [`Metadata`]: crate::metadata::Metadata

mod connect;
mod connections;
mod eval;
pub(crate) mod network;
mod node;
mod nodes;
mod port;
mod scheduler;
mod selection;

pub use connections::Connections;
pub use network::{INPUT_TYPE, NETWORK_TYPE, OUTPUT_TYPE};
pub use node::{NodeKind, NodeOptions, UniqueId};
pub use port::{PortInfo, PortRef};
pub use selection::Selection;

use std::collections::HashMap;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{GraphEvent, Notifiers, SubscriberId};
use crate::metadata::{Datablock, MetadataHandle};
use crate::state::State;
use crate::value::{Data, Value};

use network::NetworkData;
use node::NodeData;

/// The root network and everything nested inside it.
pub struct Graph {
    nodes: HashMap<UniqueId, NodeData>,
    root: UniqueId,
    config: Config,
    notifiers: Notifiers,
}

impl Graph {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an empty graph.
    pub fn with_config(config: Config) -> Self {
        let root = UniqueId::new();
        let metadata = MetadataHandle::new(network::network_metadata());
        let datablock = Datablock::new(&metadata);
        let data = NodeData::new(
            String::new(),
            None,
            metadata,
            datablock,
            Some(NetworkData::default()),
        );

        let mut nodes = HashMap::new();
        nodes.insert(root, data);

        Self {
            nodes,
            root,
            config,
            notifiers: Notifiers::default(),
        }
    }

    /// The root network.
    pub fn root(&self) -> UniqueId {
        self.root
    }

    /// The configuration the graph was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Receive every [`GraphEvent`] of this graph.
    pub fn subscribe<F>(&mut self, notify: F) -> SubscriberId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.notifiers.subscribe(notify)
    }

    /// Stop receiving events. Returns false for an unknown subscription.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.notifiers.unsubscribe(id)
    }

    /// Total number of nodes, including the root and nested networks.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether a node with this id exists.
    pub fn contains(&self, node: UniqueId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Name of a node.
    pub fn name(&self, node: UniqueId) -> Result<&str> {
        Ok(&self.node(node)?.name)
    }

    /// Enclosing network of a node. `None` for the root.
    pub fn parent(&self, node: UniqueId) -> Result<Option<UniqueId>> {
        Ok(self.node(node)?.parent)
    }

    /// Whether a node is a plain node or a network.
    pub fn kind(&self, node: UniqueId) -> Result<NodeKind> {
        Ok(self.node(node)?.kind())
    }

    /// Whether a node is a network.
    pub fn is_network(&self, node: UniqueId) -> Result<bool> {
        Ok(self.kind(node)? == NodeKind::Network)
    }

    /// Node type of a node. For networks this reflects the current boundary.
    pub fn metadata(&self, node: UniqueId) -> Result<MetadataHandle> {
        Ok(self.node(node)?.metadata.clone())
    }

    /// The node's attribute values as currently held.
    pub fn datablock(&self, node: UniqueId) -> Result<&Datablock> {
        Ok(&self.node(node)?.datablock)
    }

    /// Result of the node's last compute.
    pub fn state(&self, node: UniqueId) -> Result<&State> {
        Ok(&self.node(node)?.state)
    }

    /// Children of a network, in creation order.
    pub fn children(&self, network: UniqueId) -> Result<Vec<UniqueId>> {
        Ok(self.network_data(network)?.children.iter().copied().collect())
    }

    /// First child of a network with the given name.
    pub fn find(&self, network: UniqueId, name: &str) -> Option<UniqueId> {
        self.network_data(network)
            .ok()?
            .children
            .iter()
            .copied()
            .find(|child| self.nodes.get(child).map_or(false, |data| data.name == name))
    }

    /// Connections between the children of a network.
    pub fn connections(&self, network: UniqueId) -> Result<&Connections> {
        Ok(&self.network_data(network)?.connections)
    }

    /// Blind data of a node as `T`, if it holds a `T`.
    pub fn blind_data<T: Data>(&self, node: UniqueId) -> Result<Option<&T>> {
        Ok(self.node(node)?.blind_data.downcast_ref::<T>())
    }

    /// Blind data of a node, type-erased. Null when unset.
    pub fn blind_value(&self, node: UniqueId) -> Result<&Value> {
        Ok(&self.node(node)?.blind_data)
    }

    /// Replace a node's blind data.
    pub fn set_blind_data<T: Data>(&mut self, node: UniqueId, data: T) -> Result<()> {
        self.set_blind_value(node, Value::new(data))
    }

    /// Replace a node's blind data, type-erased.
    pub fn set_blind_value(&mut self, node: UniqueId, data: Value) -> Result<()> {
        self.node_mut(node)?.blind_data = data;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Crate-internal accessors
    // ------------------------------------------------------------------------

    /// Take over the nodes of `other`, keeping this graph's subscribers.
    pub(crate) fn replace_contents(&mut self, other: Graph) {
        self.nodes = other.nodes;
        self.root = other.root;
        self.notifiers.emit(GraphEvent::Cleared);
    }

    pub(crate) fn node(&self, node: UniqueId) -> Result<&NodeData> {
        self.nodes.get(&node).ok_or(Error::NodeNotFound(node))
    }

    pub(crate) fn node_mut(&mut self, node: UniqueId) -> Result<&mut NodeData> {
        self.nodes.get_mut(&node).ok_or(Error::NodeNotFound(node))
    }

    pub(crate) fn network_data(&self, network: UniqueId) -> Result<&NetworkData> {
        self.node(network)?
            .network
            .as_ref()
            .ok_or(Error::NotANetwork(network))
    }

    pub(crate) fn network_data_mut(&mut self, network: UniqueId) -> Result<&mut NetworkData> {
        self.node_mut(network)?
            .network
            .as_mut()
            .ok_or(Error::NotANetwork(network))
    }

    /// Connections of the network containing `node`.
    pub(crate) fn enclosing_connections(&self, node: UniqueId) -> Option<&Connections> {
        let parent = self.nodes.get(&node)?.parent?;
        self.nodes
            .get(&parent)?
            .network
            .as_ref()
            .map(|network| &network.connections)
    }

    pub(crate) fn enclosing_connections_mut(&mut self, node: UniqueId) -> Option<&mut Connections> {
        let parent = self.nodes.get(&node)?.parent?;
        self.nodes
            .get_mut(&parent)?
            .network
            .as_mut()
            .map(|network| &mut network.connections)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
