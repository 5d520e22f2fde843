//! Refresh Scheduler
//!
//! Reading a port only refreshes what that port depends on. `refresh` brings
//! the whole graph up to date instead, so that no port is left dirty.
//!
//! # Algorithm
//!
//! 1. Collect every dirty port of every network.
//! 2. For each, find the dirty ports it reads from: its source, its link
//!    source, or for a computed output the inputs influencing it.
//! 3. Sort them topologically with Kahn's algorithm (dependencies first).
//! 4. Pull each port in that order. Every pull finds its dependencies clean,
//!    so no pull recurses and each compute runs once.
//!
//! Compute failures do not stop the refresh; the first error is returned
//! once every other port has been brought up to date.

use std::collections::{HashMap, HashSet, VecDeque};

use smallvec::SmallVec;
use tracing::debug;

use super::port::PortRef;
use super::Graph;
use crate::error::Result;
use crate::metadata::Category;

impl Graph {
    /// Pull every dirty port in dependency order.
    pub fn refresh(&mut self) -> Result<()> {
        let dirty = self.dirty_ports();
        if dirty.is_empty() {
            return Ok(());
        }

        let order = self.topological_sort(dirty);
        debug!(ports = order.len(), "refreshing graph");

        let mut first_error = None;
        for port in order {
            if !self.port_state(port).dirty {
                continue;
            }
            if let Err(err) = self.pull(port, 0) {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// All dirty ports, sorted by address.
    fn dirty_ports(&self) -> Vec<PortRef> {
        let mut ports: Vec<_> = self
            .nodes
            .iter()
            .flat_map(|(id, node)| {
                node.ports
                    .iter()
                    .enumerate()
                    .filter(|(_, state)| state.dirty)
                    .map(move |(index, _)| PortRef::new(*id, index))
            })
            .collect();
        ports.sort();
        ports
    }

    /// Ports a pull of `port` reads before anything else.
    fn dependencies(&self, port: PortRef) -> SmallVec<[PortRef; 4]> {
        let mut dependencies = SmallVec::new();
        if let Some(source) = self.port_state(port).linked_from {
            dependencies.push(source);
            return dependencies;
        }
        match self.attr_unchecked(port).category() {
            Category::Input => dependencies.extend(self.source_of(port)),
            Category::Output => dependencies.extend(
                self.nodes[&port.node]
                    .metadata
                    .influenced_by(port.index)
                    .iter()
                    .map(|&index| PortRef::new(port.node, index)),
            ),
        }
        dependencies
    }

    /// Order `ports` so that dependencies come before dependents.
    ///
    /// Only edges within `ports` count. Connect-time cycle checks keep the
    /// graph acyclic, but any port left over is appended so none is lost.
    fn topological_sort(&self, ports: Vec<PortRef>) -> Vec<PortRef> {
        let port_set: HashSet<_> = ports.iter().copied().collect();
        let mut in_degree: HashMap<PortRef, usize> = HashMap::new();
        let mut dependants: HashMap<PortRef, Vec<PortRef>> = HashMap::new();
        let mut queue = VecDeque::new();

        for &port in &ports {
            let dependencies: SmallVec<[PortRef; 4]> = self
                .dependencies(port)
                .into_iter()
                .filter(|dep| port_set.contains(dep))
                .collect();
            for &dep in &dependencies {
                dependants.entry(dep).or_default().push(port);
            }
            in_degree.insert(port, dependencies.len());
            if dependencies.is_empty() {
                queue.push_back(port);
            }
        }

        // Kahn's algorithm
        let mut result = Vec::with_capacity(ports.len());
        while let Some(port) = queue.pop_front() {
            result.push(port);

            for &dependant in dependants.get(&port).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(&dependant) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(dependant);
                    }
                }
            }
        }

        if result.len() < ports.len() {
            let placed: HashSet<_> = result.iter().copied().collect();
            result.extend(ports.into_iter().filter(|port| !placed.contains(port)));
        }
        result
    }
}
