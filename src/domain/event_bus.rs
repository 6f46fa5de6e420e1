//! Broadcast channel for ledger events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Settled,
//! canceled and gifted records publish a [`LedgerEvent`] through the bus,
//! and every WebSocket connection subscribes to receive filtered events.

use tokio::sync::broadcast;

use super::LedgerEvent;

/// Broadcast bus for [`LedgerEvent`]s.
///
/// Publishing never blocks or fails the ledger operation that triggered it:
/// with no receivers the event is dropped, and lagging receivers lose the
/// oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers, returning how many received it.
    pub fn publish(&self, event: LedgerEvent) -> usize {
        let event_type = event.event_type_str();
        let channel = event.channel().label();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(event_type, %channel, delivered, "ledger event published");
        delivered
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
