//! Networks and Boundary Ports
//!
//! A network exposes ports of its own by mirroring pseudo-nodes placed
//! inside it:
//!
//! - An `input` pseudo-node has one untyped output. When it is first
//!   connected to an inner input, the network grows an input attribute named
//!   after the pseudo-node, typed like that inner input, and the new network
//!   port is linked to the pseudo-node's output.
//! - An `output` pseudo-node has one untyped input. When it is connected, the
//!   network grows an output attribute and the pseudo-node's input is linked
//!   to it.
//!
//! # Links
//!
//! A link is a one-way mirror between two ports. The link target reads its
//! value from the link source instead of computing it, and dirtying the
//! source dirties the target. The network node itself has no influences and
//! no compute; values cross its boundary through links only.
//!
//! When the last connection of a pseudo-node goes away, the boundary
//! attribute and its link are removed again. Edges attached to that boundary
//! port in the enclosing network are disconnected first, and later boundary
//! ports shift down by one index.

use indexmap::IndexSet;
use tracing::debug;

use super::connections::Connections;
use super::node::UniqueId;
use super::port::{PortRef, PortState};
use super::Graph;
use crate::error::{Error, Result};
use crate::events::GraphEvent;
use crate::metadata::{Attr, Category, Metadata, MetadataHandle};
use crate::value::Value;

/// Type name of the pseudo-node feeding a network input into the network.
pub const INPUT_TYPE: &str = "input";

/// Type name of the pseudo-node exposing a value as a network output.
pub const OUTPUT_TYPE: &str = "output";

/// Type name of networks.
pub const NETWORK_TYPE: &str = "network";

/// Metadata of the `input` pseudo-node.
pub fn input_metadata() -> Metadata {
    let mut meta = Metadata::new(INPUT_TYPE);
    meta.add_void_output("data");
    meta
}

/// Metadata of the `output` pseudo-node.
pub fn output_metadata() -> Metadata {
    let mut meta = Metadata::new(OUTPUT_TYPE);
    meta.add_void_input("data");
    meta
}

/// Template metadata of networks. Every network starts from a copy of it.
pub fn network_metadata() -> Metadata {
    Metadata::new(NETWORK_TYPE)
}

/// Contents of a network node.
#[derive(Debug, Default)]
pub(crate) struct NetworkData {
    pub(crate) children: IndexSet<UniqueId>,
    pub(crate) connections: Connections,
}

impl Graph {
    /// Whether `port` is the port of an input or output pseudo-node.
    fn pseudo_kind(&self, port: PortRef) -> Option<Category> {
        let node = self.nodes.get(&port.node)?;
        match node.metadata.type_name() {
            INPUT_TYPE if self.attr_unchecked(port).category() == Category::Output => Some(Category::Input),
            OUTPUT_TYPE if self.attr_unchecked(port).category() == Category::Input => Some(Category::Output),
            _ => None,
        }
    }

    /// Check that connecting `output` to `input` can create the boundary
    /// attributes it needs. Run before anything is modified.
    pub(crate) fn check_boundary(&self, output: PortRef, input: PortRef) -> Result<()> {
        let mut pending = Vec::new();
        if self.pseudo_kind(output) == Some(Category::Input) && self.port_state(output).linked_from.is_none() {
            pending.push(output.node);
        }
        if self.pseudo_kind(input) == Some(Category::Output) && self.port_state(input).link_to.is_none() {
            pending.push(input.node);
        }

        for pseudo in pending {
            let node = self.node(pseudo)?;
            if let Some(network) = node.parent {
                if self.node(network)?.metadata.attr_index(&node.name).is_some() {
                    return Err(Error::DuplicateName(node.name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Create boundary ports for pseudo-nodes wired by a new edge.
    pub(crate) fn link_boundary(&mut self, output: PortRef, input: PortRef) {
        if self.pseudo_kind(output) == Some(Category::Input) && self.port_state(output).linked_from.is_none() {
            let value = self.boundary_seed(output, input);
            if let Some(boundary) = self.add_boundary_port(output.node, Category::Input, value) {
                self.port_state_mut(boundary).link_to = Some(output);
                self.port_state_mut(output).linked_from = Some(boundary);
            }
        }

        if self.pseudo_kind(input) == Some(Category::Output) && self.port_state(input).link_to.is_none() {
            let value = self.boundary_seed(input, output);
            if let Some(boundary) = self.add_boundary_port(input.node, Category::Output, value) {
                self.port_state_mut(input).link_to = Some(boundary);
                self.port_state_mut(boundary).linked_from = Some(input);
            }
        }
    }

    /// Remove boundary ports whose pseudo-node lost its last connection.
    pub(crate) fn unlink_boundary(&mut self, output: PortRef, input: PortRef) {
        if self.pseudo_kind(output) == Some(Category::Input) && self.sinks_of(output).is_empty() {
            if let Some(boundary) = self.port_state(output).linked_from {
                self.remove_boundary_port(boundary);
            }
        }

        if self.pseudo_kind(input) == Some(Category::Output) {
            if let Some(boundary) = self.port_state(input).link_to {
                self.remove_boundary_port(boundary);
            }
        }
    }

    /// The boundary port a pseudo-node is currently projected onto.
    pub(crate) fn boundary_port_of(&self, node: UniqueId) -> Option<PortRef> {
        let state = self.nodes.get(&node)?.ports.first()?;
        match self.pseudo_kind(PortRef::new(node, 0))? {
            Category::Input => state.linked_from,
            Category::Output => state.link_to,
        }
    }

    pub(crate) fn rename_boundary_port(&mut self, boundary: PortRef, name: &str) {
        if let Some(node) = self.nodes.get_mut(&boundary.node) {
            let meta = MetadataHandle::make_mut(&mut node.metadata);
            meta.rename_attribute(boundary.index, name);
        }
        self.notifiers.emit(GraphEvent::MetadataChanged(boundary.node));
    }

    /// Initial value of a new boundary port: the pseudo-port's value, or the
    /// peer's declared default when the pseudo-port holds nothing yet.
    fn boundary_seed(&self, pseudo: PortRef, peer: PortRef) -> Value {
        let held = self.held(pseudo);
        if !held.is_null() {
            return held.clone();
        }
        let peer_held = self.held(peer);
        if !peer_held.is_null() {
            return peer_held.clone();
        }
        self.attr_unchecked(peer).default_value()
    }

    /// Append a boundary attribute to the network enclosing `pseudo`.
    fn add_boundary_port(&mut self, pseudo: UniqueId, category: Category, value: Value) -> Option<PortRef> {
        let name = self.nodes.get(&pseudo)?.name.clone();
        let network = self.nodes.get(&pseudo)?.parent?;
        let node = self.nodes.get_mut(&network)?;

        let attr = Attr::with_value(name.clone(), category, value.clone());
        let index = MetadataHandle::make_mut(&mut node.metadata).add_attribute(attr);
        node.ports.push(PortState::new(category));
        node.datablock.push(value);

        debug!(network = %network, attribute = %name, %category, "added boundary port");
        self.notifiers.emit(GraphEvent::MetadataChanged(network));
        Some(PortRef::new(network, index))
    }

    /// Remove a boundary attribute of a network along with its link.
    fn remove_boundary_port(&mut self, boundary: PortRef) {
        let network = boundary.node;

        // Detach the boundary port from the enclosing network first.
        let edges: Vec<_> = self
            .enclosing_connections(network)
            .map(|connections| {
                connections
                    .iter()
                    .filter(|(output, input)| *output == boundary || *input == boundary)
                    .collect()
            })
            .unwrap_or_default();
        for (output, input) in edges {
            self.disconnect_edge(output, input);
        }

        let state = self.port_state(boundary).clone();
        if let Some(target) = state.link_to {
            self.port_state_mut(target).linked_from = None;
        }
        if let Some(source) = state.linked_from {
            self.port_state_mut(source).link_to = None;
        }

        let Some(node) = self.nodes.get_mut(&network) else {
            return;
        };
        let attr = MetadataHandle::make_mut(&mut node.metadata).remove_attribute(boundary.index);
        node.ports.remove(boundary.index);
        node.datablock.remove(boundary.index);

        // Re-point the links of every boundary port that moved down.
        self.relink_boundary(network, boundary.index);

        if let Some(connections) = self.enclosing_connections_mut(network) {
            connections.shift_ports(network, boundary.index);
        }

        debug!(network = %network, attribute = attr.name(), "removed boundary port");
        self.notifiers.emit(GraphEvent::MetadataChanged(network));
    }

    /// Arrange the boundary attributes of `network` in the order of `names`.
    /// Attributes not named keep their relative order ahead of the named
    /// ones; unknown names are ignored.
    pub(crate) fn reorder_boundary(&mut self, network: UniqueId, names: &[String]) -> Result<()> {
        let metadata = &self.node(network)?.metadata;
        let mut order: IndexSet<usize> = metadata
            .attrs()
            .iter()
            .enumerate()
            .filter(|(_, attr)| !names.iter().any(|name| name == attr.name()))
            .map(|(index, _)| index)
            .collect();
        order.extend(names.iter().filter_map(|name| metadata.attr_index(name)));
        let order: Vec<usize> = order.into_iter().collect();

        if order.iter().enumerate().all(|(new, &old)| new == old) {
            return Ok(());
        }

        let mut moved_to = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            moved_to[old] = new;
        }

        let node = self.node_mut(network)?;
        MetadataHandle::make_mut(&mut node.metadata).reorder_attributes(&order);
        node.datablock.reorder(&order);
        let ports = order.iter().map(|&old| node.ports[old].clone()).collect();
        node.ports = ports;

        self.relink_boundary(network, 0);
        if let Some(connections) = self.enclosing_connections_mut(network) {
            connections.remap_ports(network, &moved_to);
        }

        debug!(network = %network, "reordered boundary ports");
        self.notifiers.emit(GraphEvent::MetadataChanged(network));
        Ok(())
    }

    /// Point the link peers of boundary ports from `start` on back at their
    /// current index.
    fn relink_boundary(&mut self, network: UniqueId, start: usize) {
        let Some(node) = self.nodes.get(&network) else {
            return;
        };
        let links: Vec<_> = node
            .ports
            .iter()
            .enumerate()
            .skip(start)
            .map(|(index, state)| (index, state.link_to, state.linked_from))
            .collect();

        for (index, link_to, linked_from) in links {
            let port = PortRef::new(network, index);
            if let Some(target) = link_to {
                self.port_state_mut(target).linked_from = Some(port);
            }
            if let Some(source) = linked_from {
                self.port_state_mut(source).link_to = Some(port);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::metadata::MetadataRegister;
    use crate::value::TypeTag;

    struct Fixture {
        graph: Graph,
        net: UniqueId,
        input: UniqueId,
        output: UniqueId,
        adder: UniqueId,
    }

    /// `net` with two input pseudo-nodes `A` and `B` feeding an adder whose
    /// result goes to the output pseudo-node `output`.
    fn fixture() -> Fixture {
        let register = MetadataRegister::with_builtins();
        let input_meta = register.require(INPUT_TYPE).unwrap();
        let output_meta = register.require(OUTPUT_TYPE).unwrap();

        let mut graph = Graph::new();
        let net = graph.add_network(graph.root(), "net").unwrap();
        let a = graph.add_node(net, &input_meta, "A").unwrap();
        let b = graph.add_node(net, &input_meta, "B").unwrap();
        let adder = graph.add_node(net, &add(), "add").unwrap();
        let out = graph.add_node(net, &output_meta, "output").unwrap();

        let connect = |graph: &mut Graph, from: UniqueId, from_port: &str, to: UniqueId, to_port: &str| {
            let output = graph.port(from, from_port).unwrap();
            let input = graph.port(to, to_port).unwrap();
            graph.connect(output, input).unwrap();
        };
        connect(&mut graph, a, "data", adder, "a");
        connect(&mut graph, b, "data", adder, "b");
        connect(&mut graph, adder, "out", out, "data");

        Fixture {
            graph,
            net,
            input: a,
            output: out,
            adder,
        }
    }

    #[test]
    fn wiring_pseudo_nodes_grows_the_network() {
        let f = fixture();
        let ports = f.graph.ports(f.net).unwrap();
        let names: Vec<_> = ports.iter().map(|port| port.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "output"]);
        assert_eq!(ports[0].category, Category::Input);
        assert_eq!(ports[2].category, Category::Output);
        assert!(ports.iter().all(|port| port.value_type == TypeTag::of::<f32>()));
    }

    #[test]
    fn boundary_ports_are_transparent() {
        let mut f = fixture();
        let a = f.graph.port(f.net, "A").unwrap();
        let b = f.graph.port(f.net, "B").unwrap();
        let out = f.graph.port(f.net, "output").unwrap();

        f.graph.set(a, 2.0f32).unwrap();
        f.graph.set(b, 3.0f32).unwrap();
        assert_eq!(f.graph.get::<f32>(out).unwrap(), 5.0);

        f.graph.set(a, 10.0f32).unwrap();
        assert!(f.graph.is_dirty(out).unwrap());
        assert_eq!(f.graph.get::<f32>(out).unwrap(), 13.0);
    }

    #[test]
    fn last_disconnect_removes_boundary_port() {
        let mut f = fixture();
        let data = f.graph.port(f.input, "data").unwrap();
        let adder_a = f.graph.port(f.adder, "a").unwrap();

        f.graph.disconnect(data, adder_a).unwrap();

        let names: Vec<_> = f
            .graph
            .ports(f.net)
            .unwrap()
            .into_iter()
            .map(|port| port.name)
            .collect();
        assert_eq!(names, vec!["B".to_string(), "output".to_string()]);
        assert_eq!(f.graph.boundary_port_of(f.input), None);

        // Remaining links were re-pointed to the shifted indices.
        assert_eq!(
            f.graph.boundary_port_of(f.output),
            Some(PortRef::new(f.net, 1))
        );
        let b = f.graph.port(f.net, "B").unwrap();
        f.graph.set(b, 4.0f32).unwrap();
        let out = f.graph.port(f.net, "output").unwrap();
        assert_eq!(f.graph.get::<f32>(out).unwrap(), 4.0);
    }

    #[test]
    fn removing_boundary_port_disconnects_outer_edges() {
        let mut f = fixture();
        let root = f.graph.root();
        let consumer = f.graph.add_node(root, &add(), "consumer").unwrap();
        let net_out = f.graph.port(f.net, "output").unwrap();
        let consumer_a = f.graph.port(consumer, "a").unwrap();
        f.graph.connect(net_out, consumer_a).unwrap();

        f.graph.remove_node(f.output).unwrap();

        assert!(f.graph.port(f.net, "output").is_err());
        assert!(f.graph.connections(root).unwrap().is_empty());
    }

    #[test]
    fn renaming_pseudo_node_renames_boundary() {
        let mut f = fixture();
        f.graph.rename(f.input, "first").unwrap();
        assert!(f.graph.port(f.net, "first").is_ok());
        assert!(f.graph.port(f.net, "A").is_err());

        // Cannot take the name of another boundary port.
        assert_eq!(
            f.graph.rename(f.input, "B"),
            Err(Error::DuplicateName("B".into()))
        );
    }

    #[test]
    fn reordering_boundary_keeps_links_and_edges() {
        let mut f = fixture();
        let root = f.graph.root();
        let consumer = f.graph.add_node(root, &add(), "consumer").unwrap();
        let consumer_a = f.graph.port(consumer, "a").unwrap();
        f.graph
            .connect(f.graph.port(f.net, "output").unwrap(), consumer_a)
            .unwrap();

        f.graph
            .reorder_boundary(f.net, &["output".to_string(), "A".to_string(), "B".to_string()])
            .unwrap();

        let names: Vec<_> = f
            .graph
            .ports(f.net)
            .unwrap()
            .into_iter()
            .map(|port| port.name)
            .collect();
        assert_eq!(names, vec!["output", "A", "B"]);
        assert_eq!(f.graph.boundary_port_of(f.input), Some(PortRef::new(f.net, 1)));
        assert_eq!(f.graph.boundary_port_of(f.output), Some(PortRef::new(f.net, 0)));
        assert_eq!(
            f.graph.connected_from(consumer_a).unwrap(),
            Some(PortRef::new(f.net, 0))
        );

        f.graph.set(f.graph.port(f.net, "A").unwrap(), 2.0f32).unwrap();
        f.graph.set(f.graph.port(f.net, "B").unwrap(), 5.0f32).unwrap();
        assert_eq!(
            f.graph.get::<f32>(f.graph.port(consumer, "out").unwrap()).unwrap(),
            7.0
        );
    }

    #[test]
    fn each_network_owns_its_metadata() {
        let mut f = fixture();
        let other = f.graph.add_network(f.graph.root(), "other").unwrap();
        assert_eq!(f.graph.metadata(f.net).unwrap().len(), 3);
        assert_eq!(f.graph.metadata(other).unwrap().len(), 0);
    }
}
