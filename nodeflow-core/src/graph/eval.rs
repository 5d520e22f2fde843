//! Dirty Propagation and Pull Evaluation
//!
//! # Marking
//!
//! `mark_as_dirty` flags a port and everything derived from it: an input
//! dirties the outputs it influences, an output dirties the inputs it feeds,
//! and any port dirties its link target. Reaching a port that is already
//! dirty ends the walk, because everything downstream of a dirty port is
//! dirty as well.
//!
//! # Pulling
//!
//! `pull` returns a port's value, refreshing it first if it is dirty:
//!
//! - a connected input copies the value of its source
//! - a linked port copies the value of its link source
//! - an unconnected input keeps the value it holds
//! - any other output runs its node's compute callback
//!
//! Before a compute runs, every input influencing the requested output is
//! pulled, so the callback only ever sees fresh values. Each step of the
//! recursion counts towards `Config::max_evaluation_depth`.
//!
//! # Compute Failures
//!
//! A failing compute does not poison the rest of the graph. The failure is
//! recorded in the node's [`State`] and the output falls back to a default
//! value, which downstream nodes then consume. Only an untyped output with
//! nothing to derive a default from reports [`Error::ComputeFailure`] to the
//! reader; it stays dirty so the next read retries.

use smallvec::SmallVec;
use tracing::{error, trace, warn};

use super::node::UniqueId;
use super::port::PortRef;
use super::Graph;
use crate::error::{ComputeError, Error, Result};
use crate::events::GraphEvent;
use crate::metadata::Category;
use crate::state::State;
use crate::value::Value;
use crate::values::Values;

impl Graph {
    /// Flag `port` and everything derived from it as dirty.
    ///
    /// With `dependants_only` the port's own flag is left alone; this is used
    /// after a new value was stored in a clean input.
    pub(crate) fn mark_as_dirty(&mut self, port: PortRef, dependants_only: bool) {
        if !dependants_only {
            if self.port_state(port).dirty {
                return;
            }
            self.port_state_mut(port).dirty = true;
            trace!(port = %port, "marked dirty");
            self.notifiers.emit(GraphEvent::FlagsChanged(port));
            self.notifiers.emit(GraphEvent::GraphDirtied);
        }

        for dependant in self.dependants(port) {
            self.mark_as_dirty(dependant, false);
        }
    }

    /// Return the value of `port`, refreshing it first if it is dirty.
    pub(crate) fn pull(&mut self, port: PortRef, depth: usize) -> Result<Value> {
        if depth > self.config.max_evaluation_depth {
            return Err(Error::EvaluationTooDeep(self.config.max_evaluation_depth));
        }

        let state = self.port_state(port);
        if !state.dirty {
            return Ok(self.held(port).clone());
        }
        let linked_from = state.linked_from;
        trace!(port = %port, depth, "pulling");

        match self.attr_unchecked(port).category() {
            Category::Input => {
                if let Some(source) = self.source_of(port) {
                    self.compute_input(port, source, depth)
                } else if let Some(source) = linked_from {
                    self.compute_input(port, source, depth)
                } else {
                    self.clean(port);
                    Ok(self.held(port).clone())
                }
            }
            Category::Output => match linked_from {
                Some(source) => self.compute_input(port, source, depth),
                None => self.compute_output(port, depth),
            },
        }
    }

    /// Refresh `port` by copying the value of `source`.
    fn compute_input(&mut self, port: PortRef, source: PortRef, depth: usize) -> Result<Value> {
        let value = self.pull(source, depth + 1)?;
        self.store(port, value.clone());
        self.clean(port);
        Ok(value)
    }

    /// Refresh an output by running its node's compute callback.
    fn compute_output(&mut self, port: PortRef, depth: usize) -> Result<Value> {
        let node = port.node;
        let metadata = self.node(node)?.metadata.clone();

        let inputs: SmallVec<[usize; 4]> = SmallVec::from_slice(metadata.influenced_by(port.index));
        let mut result = Ok(());
        for index in inputs {
            match self.pull(PortRef::new(node, index), depth + 1) {
                Ok(_) => {}
                Err(err @ Error::EvaluationTooDeep(_)) => return Err(err),
                Err(err) => {
                    result = Err(ComputeError::from(err));
                    break;
                }
            }
        }

        let result = match (result, metadata.compute()) {
            (Err(err), _) => Err(err),
            (Ok(()), Some(compute)) => {
                trace!(node = %node, port = %port, "computing");
                let mut values = Values::new(self, node, port.index, depth + 1);
                compute(&mut values)
            }
            (Ok(()), None) => Ok(State::new()),
        };

        match result {
            Ok(state) => self.update_state(node, state),
            Err(err) => self.recover(port, err)?,
        }

        self.clean(port);
        self.notifiers.emit(GraphEvent::ValueChanged(port));
        Ok(self.held(port).clone())
    }

    /// Record a failed compute and store the output's fallback value.
    ///
    /// Kept out of `compute_output` so the recursive path keeps a small
    /// stack frame.
    #[cold]
    #[inline(never)]
    fn recover(&mut self, port: PortRef, err: ComputeError) -> Result<()> {
        let node = port.node;
        warn!(node = %node, port = %port, error = %err, "compute failed");
        let state = State::error(err.message());
        match self.output_default(port) {
            Some(value) => {
                if let Some(data) = self.nodes.get_mut(&node) {
                    data.datablock.set(port.index, value);
                }
                self.update_state(node, state);
                Ok(())
            }
            None => {
                error!(node = %node, port = %port, "compute failed and output has no default");
                self.update_state(node, state);
                Err(Error::ComputeFailure {
                    node,
                    message: err.message().to_string(),
                })
            }
        }
    }

    /// Fallback value of an output whose compute failed: its declared
    /// default, or for an untyped output the default of a typed sink.
    fn output_default(&self, port: PortRef) -> Option<Value> {
        let attr = self.attr_unchecked(port);
        if !attr.is_void() {
            return Some(attr.default_value());
        }
        self.sinks_of(port)
            .into_iter()
            .map(|sink| self.attr_unchecked(sink))
            .find(|sink| !sink.is_void())
            .map(|sink| sink.default_value())
    }

    fn clean(&mut self, port: PortRef) {
        self.port_state_mut(port).dirty = false;
        self.notifiers.emit(GraphEvent::FlagsChanged(port));
    }

    fn update_state(&mut self, node: UniqueId, state: State) {
        let Some(data) = self.nodes.get_mut(&node) else {
            return;
        };
        if data.state != state {
            data.state = state;
            self.notifiers.emit(GraphEvent::StateChanged(node));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::Config;
    use crate::metadata::{Metadata, MetadataHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// `out = a + b` that counts its invocations.
    fn counting_add(calls: Arc<AtomicUsize>) -> MetadataHandle {
        let mut meta = Metadata::new("counting_add");
        let a = meta.add_input("a", 0.0f32);
        let b = meta.add_input("b", 0.0f32);
        let out = meta.add_output("out", 0.0f32);
        meta.add_influence(&a, &out);
        meta.add_influence(&b, &out);
        meta.set_compute(move |values| {
            calls.fetch_add(1, Ordering::SeqCst);
            let sum = values.get(&a)? + values.get(&b)?;
            values.set(&out, sum)?;
            Ok(State::new())
        });
        MetadataHandle::new(meta)
    }

    /// `out = 1 / x`, failing on zero.
    fn reciprocal() -> MetadataHandle {
        let mut meta = Metadata::new("reciprocal");
        let x = meta.add_input("x", 1.0f32);
        let out = meta.add_output("out", -1.0f32);
        meta.add_influence(&x, &out);
        meta.set_compute(move |values| {
            let x = values.get(&x)?;
            if x == 0.0 {
                return Err(ComputeError::msg("division by zero"));
            }
            values.set(&out, 1.0 / x)?;
            Ok(State::new())
        });
        MetadataHandle::new(meta)
    }

    /// Untyped output whose compute always fails.
    fn broken_void() -> MetadataHandle {
        let mut meta = Metadata::new("broken_void");
        let input = meta.add_input("in", 0.0f32);
        let out = meta.add_void_output("out");
        meta.add_influence(&input, &out);
        meta.set_compute(|_| Err(ComputeError::msg("broken")));
        MetadataHandle::new(meta)
    }

    #[test]
    fn evaluation_is_lazy_and_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new();
        let node = graph
            .add_node(graph.root(), &counting_add(calls.clone()), "n")
            .unwrap();
        let a = graph.port(node, "a").unwrap();
        let out = graph.port(node, "out").unwrap();

        graph.set(a, 2.0f32).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(graph.get::<f32>(out).unwrap(), 2.0);
        assert_eq!(graph.get::<f32>(out).unwrap(), 2.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!graph.is_dirty(out).unwrap());

        graph.set(a, 5.0f32).unwrap();
        assert!(graph.is_dirty(out).unwrap());
        assert_eq!(graph.get::<f32>(out).unwrap(), 5.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn setting_same_value_keeps_outputs_clean() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new();
        let node = graph
            .add_node(graph.root(), &counting_add(calls.clone()), "n")
            .unwrap();
        let a = graph.port(node, "a").unwrap();
        let out = graph.port(node, "out").unwrap();

        graph.set(a, 2.0f32).unwrap();
        graph.get::<f32>(out).unwrap();
        graph.set(a, 2.0f32).unwrap();
        assert!(!graph.is_dirty(out).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_is_rejected_on_outputs_and_connected_inputs() {
        let mut graph = Graph::new();
        let root = graph.root();
        let x = graph.add_node(root, &add(), "x").unwrap();
        let y = graph.add_node(root, &add(), "y").unwrap();
        let out = graph.port(x, "out").unwrap();
        let input = graph.port(y, "a").unwrap();
        graph.connect(out, input).unwrap();

        assert_eq!(graph.set(out, 1.0f32), Err(Error::InvalidDirection { port: out }));
        assert_eq!(graph.set(input, 1.0f32), Err(Error::AlreadyConnected { input }));
        assert!(matches!(graph.set(graph.port(y, "b").unwrap(), 1i32), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn dirtiness_reaches_downstream_nodes_only() {
        let mut graph = Graph::new();
        let root = graph.root();
        let up = graph.add_node(root, &add(), "up").unwrap();
        let down = graph.add_node(root, &add(), "down").unwrap();
        let side = graph.add_node(root, &add(), "side").unwrap();
        graph
            .connect(graph.port(up, "out").unwrap(), graph.port(down, "a").unwrap())
            .unwrap();

        let down_out = graph.port(down, "out").unwrap();
        let side_out = graph.port(side, "out").unwrap();
        graph.get::<f32>(down_out).unwrap();
        graph.get::<f32>(side_out).unwrap();

        graph.set(graph.port(up, "a").unwrap(), 1.0f32).unwrap();
        assert!(graph.is_dirty(graph.port(up, "out").unwrap()).unwrap());
        assert!(graph.is_dirty(graph.port(down, "a").unwrap()).unwrap());
        assert!(graph.is_dirty(down_out).unwrap());
        assert!(!graph.is_dirty(graph.port(down, "b").unwrap()).unwrap());
        assert!(!graph.is_dirty(side_out).unwrap());
    }

    #[test]
    fn failing_compute_falls_back_to_default() {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph.add_node(root, &reciprocal(), "r").unwrap();
        let x = graph.port(node, "x").unwrap();
        let out = graph.port(node, "out").unwrap();

        graph.set(x, 4.0f32).unwrap();
        assert_eq!(graph.get::<f32>(out).unwrap(), 0.25);
        assert!(!graph.state(node).unwrap().errored());

        graph.set(x, 0.0f32).unwrap();
        assert_eq!(graph.get::<f32>(out).unwrap(), -1.0);
        assert!(!graph.is_dirty(out).unwrap());
        let state = graph.state(node).unwrap();
        assert!(state.errored());
        assert_eq!(state.to_string(), "error: division by zero");

        graph.set(x, 2.0f32).unwrap();
        assert_eq!(graph.get::<f32>(out).unwrap(), 0.5);
        assert!(!graph.state(node).unwrap().errored());
    }

    #[test]
    fn failure_without_default_is_reported() {
        let mut graph = Graph::new();
        let node = graph.add_node(graph.root(), &broken_void(), "b").unwrap();
        let out = graph.port(node, "out").unwrap();

        let err = graph.get_value(out).unwrap_err();
        assert_eq!(
            err,
            Error::ComputeFailure {
                node,
                message: "broken".into()
            }
        );
        assert!(graph.state(node).unwrap().errored());
        assert!(graph.is_dirty(out).unwrap());
    }

    #[test]
    fn untyped_output_borrows_default_from_sink() {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph.add_node(root, &broken_void(), "b").unwrap();
        let sink = graph.add_node(root, &add(), "sink").unwrap();
        graph
            .connect(graph.port(node, "out").unwrap(), graph.port(sink, "a").unwrap())
            .unwrap();
        graph.set(graph.port(sink, "b").unwrap(), 3.0f32).unwrap();

        assert_eq!(graph.get::<f32>(graph.port(sink, "out").unwrap()).unwrap(), 3.0);
        assert!(graph.state(node).unwrap().errored());
        assert!(!graph.state(sink).unwrap().errored());
    }

    #[test]
    fn upstream_failure_degrades_downstream() {
        let mut graph = Graph::new();
        let root = graph.root();
        let pass = graph.add_node(root, &passthrough(), "pass").unwrap();
        let sink = graph.add_node(root, &add(), "sink").unwrap();
        graph
            .connect(graph.port(pass, "out").unwrap(), graph.port(sink, "a").unwrap())
            .unwrap();

        // `pass.in` is unconnected and untyped, so its compute fails and the
        // sink sees the fallback.
        let out = graph.port(sink, "out").unwrap();
        assert_eq!(graph.get::<f32>(out).unwrap(), 0.0);
        assert!(graph.state(pass).unwrap().errored());
    }

    #[test]
    fn state_changes_are_announced() {
        let mut graph = Graph::new();
        let node = graph.add_node(graph.root(), &reciprocal(), "r").unwrap();
        let x = graph.port(node, "x").unwrap();
        let out = graph.port(node, "out").unwrap();

        let changes = Arc::new(Mutex::new(0));
        let changes_clone = changes.clone();
        graph.subscribe(move |event| {
            if let GraphEvent::StateChanged(_) = event {
                *changes_clone.lock().unwrap() += 1;
            }
        });

        graph.get::<f32>(out).unwrap();
        assert_eq!(*changes.lock().unwrap(), 0);

        graph.set(x, 0.0f32).unwrap();
        graph.get::<f32>(out).unwrap();
        graph.set(x, f32::MIN_POSITIVE).unwrap();
        graph.set(x, 0.0f32).unwrap();
        graph.get::<f32>(out).unwrap();
        assert_eq!(*changes.lock().unwrap(), 1);

        graph.set(x, 1.0f32).unwrap();
        graph.get::<f32>(out).unwrap();
        assert_eq!(*changes.lock().unwrap(), 2);
    }

    /// A chain of `len` adders, each feeding `a` of the next. Returns the
    /// first and last node.
    fn chain(graph: &mut Graph, len: usize) -> (UniqueId, UniqueId) {
        let root = graph.root();
        let first = graph.add_node(root, &add(), "n0").unwrap();
        let mut previous = first;
        for i in 1..len {
            let next = graph.add_node(root, &add(), &format!("n{}", i)).unwrap();
            graph
                .connect(graph.port(previous, "out").unwrap(), graph.port(next, "a").unwrap())
                .unwrap();
            previous = next;
        }
        (first, previous)
    }

    #[test]
    fn default_depth_limit_fits_a_small_stack() {
        let result = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let mut graph = Graph::new();
                let (_, last) = chain(&mut graph, 600);
                let out = graph.port(last, "out").unwrap();
                graph.get::<f32>(out)
            })
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(
            result,
            Err(Error::EvaluationTooDeep(crate::config::DEFAULT_EVALUATION_DEPTH))
        );
    }

    #[test]
    fn refresh_evaluates_chains_past_the_depth_limit() {
        let mut graph = Graph::new();
        let (first, last) = chain(&mut graph, 600);
        graph.set(graph.port(first, "a").unwrap(), 1.0f32).unwrap();

        graph.refresh().unwrap();
        let out = graph.port(last, "out").unwrap();
        assert!(!graph.is_dirty(out).unwrap());
        assert_eq!(graph.get::<f32>(out).unwrap(), 1.0);
    }

    #[test]
    fn deep_chains_hit_the_depth_limit() {
        let mut graph = Graph::with_config(Config {
            max_evaluation_depth: 8,
            ..Config::default()
        });
        let (_, last) = chain(&mut graph, 10);

        let out = graph.port(last, "out").unwrap();
        assert_eq!(graph.get::<f32>(out), Err(Error::EvaluationTooDeep(8)));
    }
}
