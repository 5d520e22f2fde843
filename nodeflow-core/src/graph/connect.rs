//! Connect / Disconnect
//!
//! `connect` validates everything up front and only then touches the graph:
//!
//! 1. the output really is an output and the input an input
//! 2. the input has no source yet
//! 3. the new edge does not close a cycle
//! 4. the resolved types agree, or exactly one side is void
//! 5. both nodes sit in the same network
//! 6. any boundary attribute the edge would create has a free name
//!
//! A successful connect registers the edge, seeds untyped slots from the
//! peer, grows the network boundary when a pseudo-node gets wired, and dirties
//! both ends.

use std::collections::HashSet;

use smallvec::SmallVec;
use tracing::debug;

use super::port::PortRef;
use super::Graph;
use crate::error::{Error, Result};
use crate::events::GraphEvent;
use crate::metadata::Category;

impl Graph {
    /// Connect an output port to an input port of a sibling node.
    pub fn connect(&mut self, output: PortRef, input: PortRef) -> Result<()> {
        if self.attr(output)?.category() != Category::Output {
            return Err(Error::InvalidDirection { port: output });
        }
        if self.attr(input)?.category() != Category::Input {
            return Err(Error::InvalidDirection { port: input });
        }

        if self.source_of(input).is_some() {
            return Err(Error::AlreadyConnected { input });
        }

        if self.reaches(input, output) {
            return Err(Error::CyclicDependency { output, input });
        }

        let output_type = self.resolve_type(output);
        let input_type = self.resolve_type(input);
        if output_type.is_void() && input_type.is_void() {
            return Err(Error::TypeMismatch {
                expected: "a typed port".to_string(),
                found: "void".to_string(),
            });
        }
        if !output_type.is_void() && !input_type.is_void() && output_type != input_type {
            return Err(Error::TypeMismatch {
                expected: input_type.name().to_string(),
                found: output_type.name().to_string(),
            });
        }

        let parent = self.node(output.node)?.parent;
        if parent.is_none() || parent != self.node(input.node)?.parent {
            return Err(Error::CrossNetworkConnection { output, input });
        }

        self.check_boundary(output, input)?;

        // Validation done; nothing below fails.
        if let Some(connections) = self.enclosing_connections_mut(input.node) {
            connections.add(output, input);
        }

        if self.attr_unchecked(input).is_void() {
            let value = self.held(output).clone();
            self.store(input, value);
        }
        if self.attr_unchecked(output).is_void() && self.held(output).is_null() {
            let value = self.held(input).clone();
            self.store(output, value);
        }

        self.link_boundary(output, input);

        debug!(output = %output, input = %input, "connected");
        self.mark_as_dirty(input, false);
        self.mark_as_dirty(output, false);
        self.notifiers.emit(GraphEvent::Connected { output, input });
        Ok(())
    }

    /// Remove the connection from `output` to `input`.
    pub fn disconnect(&mut self, output: PortRef, input: PortRef) -> Result<()> {
        self.attr(output)?;
        self.attr(input)?;

        let connected = self
            .enclosing_connections(input.node)
            .map_or(false, |connections| connections.contains(output, input));
        if !connected {
            return Err(Error::NotConnected { output, input });
        }

        self.disconnect_edge(output, input);
        Ok(())
    }

    /// Remove an edge known to exist. Untyped and non-serializable inputs
    /// fall back to their default; an untyped output left without sinks
    /// becomes null again.
    pub(crate) fn disconnect_edge(&mut self, output: PortRef, input: PortRef) {
        let removed = self
            .enclosing_connections_mut(input.node)
            .map_or(false, |connections| connections.remove(output, input));
        if !removed {
            return;
        }

        let input_attr = self.attr_unchecked(input);
        if input_attr.is_void() || !input_attr.flags().serializable {
            let value = input_attr.default_value();
            self.store(input, value);
        }

        let output_attr = self.attr_unchecked(output);
        if output_attr.is_void() && self.sinks_of(output).is_empty() {
            let value = output_attr.default_value();
            self.store(output, value);
        }

        debug!(output = %output, input = %input, "disconnected");
        self.mark_as_dirty(input, false);
        self.unlink_boundary(output, input);
        self.notifiers.emit(GraphEvent::Disconnected { output, input });
    }

    /// Whether `target` is reachable downstream of `from`, following
    /// influences, connections and links.
    fn reaches(&self, from: PortRef, target: PortRef) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];

        while let Some(port) = stack.pop() {
            if port == target {
                return true;
            }
            if !visited.insert(port) {
                continue;
            }
            stack.extend(self.dependants(port));
        }
        false
    }

    /// Ports whose value is derived from `port`.
    pub(crate) fn dependants(&self, port: PortRef) -> SmallVec<[PortRef; 8]> {
        let mut dependants = SmallVec::new();
        let node = &self.nodes[&port.node];
        match self.attr_unchecked(port).category() {
            Category::Input => dependants.extend(
                node.metadata
                    .influences(port.index)
                    .iter()
                    .map(|&index| PortRef::new(port.node, index)),
            ),
            Category::Output => dependants.extend(self.sinks_of(port)),
        }
        if let Some(target) = node.ports[port.index].link_to {
            dependants.push(target);
        }
        dependants
    }
}
