//! Graph Documents
//!
//! A [`NetworkDocument`] is the serializable form of a network: its nodes by
//! name, in creation order, and its connections by node and port names.
//! Nested networks carry their own document, so a whole graph is one tree.
//!
//! Only what cannot be recomputed is stored: the values of unconnected,
//! serializable inputs and each node's blind data. Network boundary ports
//! are rebuilt when the inner pseudo-nodes are wired again on load; the
//! document only records their order.
//!
//! Stored node ids are reserved before anything is created, so a document
//! written by another process loads regardless of the ids this process has
//! handed out.
//!
//! Documents encode to JSON and to MessagePack. Loading a JSON document and
//! saving it again yields the same text.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeOptions, PortRef, UniqueId, NETWORK_TYPE};
use crate::metadata::{Category, MetadataRegister};

/// Serializable form of a network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDocument {
    /// Child nodes by name, in creation order.
    pub nodes: IndexMap<String, NodeDocument>,
    /// Connections between the children, in creation order.
    #[serde(default)]
    pub connections: Vec<ConnectionDocument>,
    /// Boundary attribute names, in attribute order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boundary: Vec<String>,
}

/// Serializable form of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Node type name, resolved against a [`MetadataRegister`] on load.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Stable node id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Values of unconnected serializable inputs, by port name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub ports: IndexMap<String, serde_json::Value>,
    /// Client-owned data attached to the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blind_data: Option<BlindDocument>,
    /// Contents, for networks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkDocument>,
}

/// Blind data tagged with its data type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlindDocument {
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: serde_json::Value,
}

/// One connection, by node and port names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDocument {
    pub out_node: String,
    pub out_port: String,
    pub in_node: String,
    pub in_port: String,
}

impl NetworkDocument {
    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as MessagePack, with named fields.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode from MessagePack.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Largest node id stored anywhere in the document.
    pub fn max_id(&self) -> Option<u64> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.id
                    .into_iter()
                    .chain(node.network.as_ref().and_then(NetworkDocument::max_id))
            })
            .max()
    }
}

impl Graph {
    /// Document of the whole graph.
    pub fn to_document(&self) -> Result<NetworkDocument> {
        self.network_document(self.root())
    }

    /// Document of one network and everything nested in it.
    pub fn network_document(&self, network: UniqueId) -> Result<NetworkDocument> {
        let mut document = NetworkDocument::default();

        for child in self.children(network)? {
            let name = self.name(child)?.to_string();
            let node = self.node_document(child)?;
            document.nodes.insert(name, node);
        }

        for (output, input) in self.connections(network)?.iter() {
            document.connections.push(ConnectionDocument {
                out_node: self.name(output.node)?.to_string(),
                out_port: self.port_name(output)?.to_string(),
                in_node: self.name(input.node)?.to_string(),
                in_port: self.port_name(input)?.to_string(),
            });
        }

        document.boundary = self
            .metadata(network)?
            .attrs()
            .iter()
            .map(|attr| attr.name().to_string())
            .collect();

        Ok(document)
    }

    fn node_document(&self, node: UniqueId) -> Result<NodeDocument> {
        let metadata = self.metadata(node)?;

        let mut ports = IndexMap::new();
        for info in self.ports(node)? {
            let attr = &metadata.attrs()[info.index];
            if info.category != Category::Input || !attr.flags().serializable {
                continue;
            }
            let port = PortRef::new(node, info.index);
            if info.value_type.is_void() || self.connected_from(port)?.is_some() {
                continue;
            }
            let value = self.held_value(port)?;
            if !value.is_null() {
                ports.insert(info.name, value.to_json()?);
            }
        }

        let blind = self.blind_value(node)?;
        let blind_data = if blind.is_null() {
            None
        } else {
            Some(BlindDocument {
                type_name: blind.type_tag().name().to_string(),
                value: blind.to_json()?,
            })
        };

        let network = if self.is_network(node)? {
            Some(self.network_document(node)?)
        } else {
            None
        };

        Ok(NodeDocument {
            type_name: metadata.type_name().to_string(),
            id: Some(node.raw()),
            ports,
            blind_data,
            network,
        })
    }

    /// Build a graph from a document.
    pub fn from_document(document: &NetworkDocument, register: &MetadataRegister) -> Result<Graph> {
        reserve_ids(document);
        let mut graph = Graph::new();
        graph.load_network(graph.root(), document, register)?;
        Ok(graph)
    }

    /// Replace the contents of this graph with a document. On failure the
    /// graph is left as it was.
    pub fn load_document(&mut self, document: &NetworkDocument, register: &MetadataRegister) -> Result<()> {
        reserve_ids(document);
        let mut loaded = Graph::with_config(self.config().clone());
        loaded.load_network(loaded.root(), document, register)?;
        self.replace_contents(loaded);
        Ok(())
    }

    /// Load a document into an existing network, next to its current
    /// children.
    pub fn load_network(
        &mut self,
        network: UniqueId,
        document: &NetworkDocument,
        register: &MetadataRegister,
    ) -> Result<()> {
        debug!(network = %network, nodes = document.nodes.len(), "loading document");

        // Nodes first, then inner contents, so nested boundaries exist
        // before the outer connections refer to them.
        let mut ids = Vec::with_capacity(document.nodes.len());
        for (name, node) in &document.nodes {
            let metadata = register.require(&node.type_name)?;
            let blind_data = match &node.blind_data {
                Some(blind) => {
                    let data_type = register
                        .data_type(&blind.type_name)
                        .ok_or_else(|| Error::UnknownDataType(blind.type_name.clone()))?;
                    Some(data_type.decode(blind.value.clone())?)
                }
                None => None,
            };
            let options = NodeOptions {
                blind_data,
                id: node.id.map(UniqueId::from),
                ..NodeOptions::default()
            };

            let id = self.add_node_with(network, &metadata, name, options)?;
            if let Some(inner) = &node.network {
                if metadata.type_name() != NETWORK_TYPE {
                    return Err(Error::NotANetwork(id));
                }
                self.load_network(id, inner, register)?;
            }
            ids.push(id);
        }

        for connection in &document.connections {
            let out_node = self.named_child(network, &connection.out_node)?;
            let in_node = self.named_child(network, &connection.in_node)?;
            let output = self.port(out_node, &connection.out_port)?;
            let input = self.port(in_node, &connection.in_port)?;
            self.connect(output, input)?;
        }
        self.reorder_boundary(network, &document.boundary)?;

        for (node, &id) in document.nodes.values().zip(&ids) {
            for (port_name, json) in &node.ports {
                let port = self.port(id, port_name)?;
                let value_type = self.port_type(port)?;
                if value_type.is_void() {
                    return Err(Error::UnconnectedUntypedRead { port });
                }
                self.set_value(port, value_type.decode(json.clone())?)?;
            }
        }

        Ok(())
    }

    fn named_child(&self, network: UniqueId, name: &str) -> Result<UniqueId> {
        self.find(network, name).ok_or_else(|| Error::PortNotFound {
            node: network,
            port: name.to_string(),
        })
    }
}

/// Keep freshly generated ids clear of the ids stored in `document`.
fn reserve_ids(document: &NetworkDocument) {
    if let Some(max) = document.max_id() {
        UniqueId::reserve(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::*;
    use crate::graph::{INPUT_TYPE, OUTPUT_TYPE};
    use crate::metadata::{AttrFlags, Metadata, MetadataHandle};

    fn register() -> MetadataRegister {
        let register = MetadataRegister::with_builtins();
        register.register_handle(add()).unwrap();
        register.register_handle(mul()).unwrap();
        register
    }

    /// A `sum` network adding its inputs `A` and `B`, scaled by a node outside.
    fn sample(register: &MetadataRegister) -> Graph {
        let mut graph = Graph::new();
        let root = graph.root();
        let input = register.require(INPUT_TYPE).unwrap();
        let output = register.require(OUTPUT_TYPE).unwrap();

        let net = graph.add_network(root, "sum").unwrap();
        let a = graph.add_node(net, &input, "A").unwrap();
        let b = graph.add_node(net, &input, "B").unwrap();
        let adder = graph.add_node(net, &add(), "add").unwrap();
        let out = graph.add_node(net, &output, "result").unwrap();
        graph.connect(graph.port(a, "data").unwrap(), graph.port(adder, "a").unwrap()).unwrap();
        graph.connect(graph.port(b, "data").unwrap(), graph.port(adder, "b").unwrap()).unwrap();
        graph.connect(graph.port(adder, "out").unwrap(), graph.port(out, "data").unwrap()).unwrap();

        let scale = graph.add_node(root, &mul(), "scale").unwrap();
        graph
            .connect(graph.port(net, "result").unwrap(), graph.port(scale, "a").unwrap())
            .unwrap();

        graph.set(graph.port(net, "A").unwrap(), 2.0f32).unwrap();
        graph.set(graph.port(net, "B").unwrap(), 3.0f32).unwrap();
        graph.set(graph.port(scale, "b").unwrap(), 10.0f32).unwrap();
        graph.set_blind_data(scale, String::from("position: 10,20")).unwrap();
        graph
    }

    #[test]
    fn document_lists_only_unconnected_inputs() {
        let register = register();
        let graph = sample(&register);
        let document = graph.to_document().unwrap();

        let scale = &document.nodes["scale"];
        assert_eq!(scale.type_name, "mul");
        assert_eq!(scale.ports.keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(scale.ports["b"], serde_json::json!(10.0));

        let sum = &document.nodes["sum"];
        assert_eq!(sum.type_name, NETWORK_TYPE);
        assert_eq!(sum.ports.len(), 2);
        let inner = sum.network.as_ref().unwrap();
        assert_eq!(inner.boundary, vec!["A", "B", "result"]);
        assert_eq!(inner.nodes.len(), 4);
        assert_eq!(inner.connections.len(), 3);
        assert!(inner.nodes["add"].ports.is_empty());
    }

    #[test]
    fn json_round_trip_is_identical() {
        let register = register();
        let mut graph = sample(&register);
        let json = graph.to_document().unwrap().to_json().unwrap();

        let document = NetworkDocument::from_json(&json).unwrap();
        graph.clear().unwrap();
        graph.load_document(&document, &register).unwrap();
        assert_eq!(graph.to_document().unwrap().to_json().unwrap(), json);

        let scale = graph.find(graph.root(), "scale").unwrap();
        assert_eq!(graph.get::<f32>(graph.port(scale, "out").unwrap()).unwrap(), 50.0);
        assert_eq!(
            graph.blind_data::<String>(scale).unwrap().map(String::as_str),
            Some("position: 10,20")
        );
    }

    #[test]
    fn msgpack_round_trip() {
        let register = register();
        let graph = sample(&register);
        let document = graph.to_document().unwrap();

        let bytes = document.to_msgpack().unwrap();
        assert_eq!(NetworkDocument::from_msgpack(&bytes).unwrap(), document);
    }

    #[test]
    fn unknown_types_fail_without_touching_the_graph() {
        let register = register();
        let mut graph = sample(&register);
        let before = graph.to_document().unwrap();

        let mut document = before.clone();
        document.nodes["scale"].type_name = "divide".into();
        assert_eq!(
            graph.load_document(&document, &register),
            Err(Error::UnknownNodeType("divide".into()))
        );
        assert_eq!(graph.to_document().unwrap(), before);
    }

    #[test]
    fn boundary_order_survives_rewiring() {
        let register = register();
        let input = register.require(INPUT_TYPE).unwrap();
        let output = register.require(OUTPUT_TYPE).unwrap();

        let mut graph = Graph::new();
        let net = graph.add_network(graph.root(), "net").unwrap();
        let a = graph.add_node(net, &input, "A").unwrap();
        let b = graph.add_node(net, &input, "B").unwrap();
        let x = graph.add_node(net, &add(), "x").unwrap();
        let y = graph.add_node(net, &add(), "y").unwrap();
        let out = graph.add_node(net, &output, "out").unwrap();
        let wire = |graph: &mut Graph, from: UniqueId, from_port: &str, to: UniqueId, to_port: &str| {
            let output = graph.port(from, from_port).unwrap();
            let input = graph.port(to, to_port).unwrap();
            graph.connect(output, input).unwrap();
        };
        wire(&mut graph, a, "data", x, "a");
        wire(&mut graph, b, "data", x, "b");
        wire(&mut graph, x, "out", out, "data");
        wire(&mut graph, a, "data", y, "a");

        // `A` keeps its boundary port but its first edge goes away, so the
        // remaining edges no longer list it first.
        graph
            .disconnect(graph.port(a, "data").unwrap(), graph.port(x, "a").unwrap())
            .unwrap();
        graph.set(graph.port(net, "A").unwrap(), 4.0f32).unwrap();
        graph.set(graph.port(net, "B").unwrap(), 6.0f32).unwrap();

        let json = graph.to_document().unwrap().to_json().unwrap();
        let mut loaded = Graph::from_document(&NetworkDocument::from_json(&json).unwrap(), &register).unwrap();
        assert_eq!(loaded.to_document().unwrap().to_json().unwrap(), json);

        let net = loaded.find(loaded.root(), "net").unwrap();
        let names: Vec<_> = loaded.ports(net).unwrap().into_iter().map(|port| port.name).collect();
        assert_eq!(names, vec!["A", "B", "out"]);
        assert_eq!(loaded.get::<f32>(loaded.port(net, "out").unwrap()).unwrap(), 6.0);
    }

    #[test]
    fn stored_ids_never_collide_with_fresh_ones() {
        let register = register();
        let mut graph = Graph::new();

        // The id the next loading graph would give its own root.
        let next = UniqueId::new().raw() + 1;
        let mut document = NetworkDocument::default();
        document.nodes.insert(
            "net".into(),
            NodeDocument {
                type_name: NETWORK_TYPE.into(),
                id: Some(next),
                ports: IndexMap::new(),
                blind_data: None,
                network: None,
            },
        );

        graph.load_document(&document, &register).unwrap();
        let net = graph.find(graph.root(), "net").unwrap();
        assert_eq!(net.raw(), next);
        assert_ne!(graph.root(), net);
        assert!(UniqueId::new().raw() > next);
    }

    #[test]
    fn max_id_looks_into_nested_networks() {
        let register = register();
        let graph = sample(&register);
        let document = graph.to_document().unwrap();

        let deepest = document.nodes["sum"]
            .network
            .as_ref()
            .unwrap()
            .nodes
            .values()
            .filter_map(|node| node.id)
            .max()
            .unwrap();
        assert!(document.max_id().unwrap() >= deepest);
        assert_eq!(NetworkDocument::default().max_id(), None);
    }

    #[test]
    fn non_serializable_inputs_are_left_out() {
        let mut meta = Metadata::new("tagged");
        meta.add_input_with_flags("label", String::new(), AttrFlags { serializable: false });
        let gain = meta.add_input("gain", 1.0f32);
        let out = meta.add_output("out", 0.0f32);
        meta.add_influence(&gain, &out);
        let tagged = MetadataHandle::new(meta);

        let mut graph = Graph::new();
        let node = graph.add_node(graph.root(), &tagged, "tagged").unwrap();
        graph.set(graph.port(node, "label").unwrap(), String::from("scratch")).unwrap();
        graph.set(graph.port(node, "gain").unwrap(), 2.0f32).unwrap();

        let document = graph.to_document().unwrap();
        let ports: Vec<_> = document.nodes["tagged"].ports.keys().collect();
        assert_eq!(ports, vec!["gain"]);
    }
}
