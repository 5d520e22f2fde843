//! Graph Events
//!
//! A graph reports every structural and evaluation change as a
//! [`GraphEvent`]. Listeners subscribe with a callback and receive events
//! synchronously, in the order the changes happen, before the mutating call
//! returns. There is no queue.
//!
//! Callbacks only see the event, never the graph, so they cannot mutate the
//! graph while it is in the middle of an update.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::graph::{PortRef, UniqueId};

/// Unique identifier of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A change to a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// A node was created inside a network.
    NodeAdded(UniqueId),
    /// A node is about to be destroyed. Its edges are already gone.
    NodeRemoved(UniqueId),
    /// A connection was made.
    Connected {
        /// Source output port.
        output: PortRef,
        /// Target input port.
        input: PortRef,
    },
    /// A connection was removed.
    Disconnected {
        /// Source output port.
        output: PortRef,
        /// Target input port.
        input: PortRef,
    },
    /// The dirty flag of a port changed.
    FlagsChanged(PortRef),
    /// The held value of a port changed.
    ValueChanged(PortRef),
    /// The state of a node differs from its previous compute.
    StateChanged(UniqueId),
    /// Some port of the graph became dirty.
    GraphDirtied,
    /// A network gained or lost a boundary attribute.
    MetadataChanged(UniqueId),
    /// The graph was cleared.
    Cleared,
}

type Notify = Box<dyn Fn(&GraphEvent) + Send + Sync>;

/// Subscribed callbacks of one graph.
#[derive(Default)]
pub(crate) struct Notifiers {
    subscribers: Vec<(SubscriberId, Notify)>,
}

impl Notifiers {
    pub(crate) fn subscribe<F>(&mut self, notify: F) -> SubscriberId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.subscribers.push((id, Box::new(notify)));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub(crate) fn emit(&self, event: GraphEvent) {
        for (_, notify) in &self.subscribers {
            notify(&event);
        }
    }
}
