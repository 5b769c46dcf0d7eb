//! Fan-out of session signal events to push subscribers
//!
//! Uses `tokio::sync::broadcast` so the broadcaster never blocks: a lagged
//! or dropped subscriber is skipped, not fatal. Each `/events` connection
//! holds its own receiver, which leaves the registry when dropped.

use serde_json::json;
use tokio::sync::broadcast;

/// A named event pushed to every subscriber
#[derive(Debug, Clone)]
pub struct RelayEvent {
    /// Event name, written as the SSE `event:` line
    pub name: String,
    /// JSON payload, written as the SSE `data:` line
    pub data: serde_json::Value,
}

impl RelayEvent {
    /// Create an event with an arbitrary name and payload
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// The session-finished event
    pub fn finished() -> Self {
        Self::new("finished", json!({ "event": "finished" }))
    }
}

/// Registry of per-connection delivery queues
pub struct EventHub {
    tx: broadcast::Sender<RelayEvent>,
}

impl EventHub {
    /// Create a hub whose per-subscriber queues hold `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Enqueue an event to every registered subscriber, best-effort
    ///
    /// Returns the number of subscribers that received it, 0 if none.
    pub fn broadcast(&self, event: RelayEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Register a new subscriber queue
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    /// Current number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
