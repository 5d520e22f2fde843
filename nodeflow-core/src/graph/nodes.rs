//! Node creation and removal.

use tracing::debug;

use super::network::{self, NetworkData};
use super::node::{NodeData, NodeOptions, UniqueId};
use super::Graph;
use crate::error::{Error, Result};
use crate::events::GraphEvent;
use crate::metadata::{Datablock, MetadataHandle};
use crate::value::Value;

impl Graph {
    /// Instantiate a node type inside a network.
    pub fn add_node(&mut self, parent: UniqueId, metadata: &MetadataHandle, name: &str) -> Result<UniqueId> {
        self.add_node_with(parent, metadata, name, NodeOptions::default())
    }

    /// Create an empty sub-network.
    pub fn add_network(&mut self, parent: UniqueId, name: &str) -> Result<UniqueId> {
        let metadata = MetadataHandle::new(network::network_metadata());
        self.add_node_with(parent, &metadata, name, NodeOptions::default())
    }

    /// Instantiate a node type inside a network, with optional blind data,
    /// initial values or a fixed id.
    ///
    /// A metadata of type [`NETWORK_TYPE`](super::NETWORK_TYPE) creates a
    /// network; it gets its own copy of the metadata so its boundary can grow
    /// independently of other networks.
    pub fn add_node_with(
        &mut self,
        parent: UniqueId,
        metadata: &MetadataHandle,
        name: &str,
        options: NodeOptions,
    ) -> Result<UniqueId> {
        self.network_data(parent)?;

        let name = self.available_name(parent, name)?;

        let id = options.id.unwrap_or_default();
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }

        let datablock = match options.datablock {
            Some(datablock) if datablock.len() != metadata.len() => {
                return Err(Error::DatablockMismatch {
                    expected: metadata.len(),
                    found: datablock.len(),
                });
            }
            Some(datablock) => datablock,
            None => Datablock::new(metadata),
        };

        let (metadata, network) = if metadata.type_name() == network::NETWORK_TYPE {
            (
                MetadataHandle::new(metadata.as_ref().clone()),
                Some(NetworkData::default()),
            )
        } else {
            (metadata.clone(), None)
        };

        let mut data = NodeData::new(name, Some(parent), metadata, datablock, network);
        data.blind_data = options.blind_data.unwrap_or_else(Value::null);

        debug!(node = %id, name = %data.name, node_type = data.metadata.type_name(), parent = %parent, "adding node");

        self.nodes.insert(id, data);
        self.network_data_mut(parent)?.children.insert(id);
        self.notifiers.emit(GraphEvent::NodeAdded(id));
        Ok(id)
    }

    /// Destroy a node. Its connections are removed first; a network's
    /// children are destroyed recursively.
    pub fn remove_node(&mut self, node: UniqueId) -> Result<()> {
        if node == self.root {
            return Err(Error::RootRemoval);
        }
        let parent = self.node(node)?.parent.ok_or(Error::RootRemoval)?;

        if let Some(network) = &self.node(node)?.network {
            let children: Vec<_> = network.children.iter().rev().copied().collect();
            for child in children {
                self.remove_node(child)?;
            }
        }

        let edges = self
            .enclosing_connections(node)
            .map(|connections| connections.edges_of(node))
            .unwrap_or_default();
        for (output, input) in edges {
            // Earlier disconnects may have cascaded through boundary ports.
            if self.source_of(input) == Some(output) {
                self.disconnect_edge(output, input);
            }
        }

        debug!(node = %node, "removing node");
        self.notifiers.emit(GraphEvent::NodeRemoved(node));

        self.network_data_mut(parent)?.children.shift_remove(&node);
        self.nodes.remove(&node);
        Ok(())
    }

    /// Rename a node. Renaming a pseudo-node also renames the boundary
    /// attribute it projects onto its network.
    pub fn rename(&mut self, node: UniqueId, name: &str) -> Result<()> {
        let parent = self.node(node)?.parent.ok_or(Error::RootRemoval)?;
        if self.node(node)?.name == name {
            return Ok(());
        }
        let name = self.available_name(parent, name)?;

        if let Some(boundary) = self.boundary_port_of(node) {
            let taken = self.node(boundary.node)?.metadata.attr_index(&name).is_some();
            if taken {
                return Err(Error::DuplicateName(name));
            }
            self.rename_boundary_port(boundary, &name);
        }

        self.node_mut(node)?.name = name;
        Ok(())
    }

    /// Remove every node from the graph.
    pub fn clear(&mut self) -> Result<()> {
        let children: Vec<_> = self
            .network_data(self.root)
            .map(|network| network.children.iter().rev().copied().collect())
            .unwrap_or_default();
        for child in children {
            self.remove_node(child)?;
        }

        debug!("graph cleared");
        self.notifiers.emit(GraphEvent::Cleared);
        Ok(())
    }

    /// Check `name` against the siblings in `parent`, applying the naming
    /// policy of the configuration.
    fn available_name(&self, parent: UniqueId, name: &str) -> Result<String> {
        if self.find(parent, name).is_none() {
            return Ok(name.to_string());
        }
        if self.config.unique_names {
            return Err(Error::DuplicateName(name.to_string()));
        }

        let mut suffix = 1;
        loop {
            let candidate = format!("{}_{}", name, suffix);
            if self.find(parent, &candidate).is_none() {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }
}
