//! Collection change events
//!
//! Listeners are registered on a collection with `subscribe` and invoked
//! synchronously after each mutation, in registration order.

use std::fmt;

use crate::record::Record;

/// Type of collection change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// New record inserted
    Added,
    /// Existing record merged or replaced
    Updated,
    /// Record deleted
    Removed,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Added => write!(f, "ADDED"),
            EventType::Updated => write!(f, "UPDATED"),
            EventType::Removed => write!(f, "REMOVED"),
        }
    }
}

/// A change to one record
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    Added(Record),
    Updated(Record),
    Removed(Record),
}

impl CollectionEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            CollectionEvent::Added(_) => EventType::Added,
            CollectionEvent::Updated(_) => EventType::Updated,
            CollectionEvent::Removed(_) => EventType::Removed,
        }
    }

    /// The record the event concerns
    pub fn record(&self) -> &Record {
        match self {
            CollectionEvent::Added(r) | CollectionEvent::Updated(r) | CollectionEvent::Removed(r) => r,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Callback invoked for every event
pub type Listener = Box<dyn FnMut(&CollectionEvent) + Send>;

/// Ordered listener registry owned by one collection
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener)>,
}

impl Listeners {
    pub(crate) fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn emit(&mut self, event: &CollectionEvent) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}
