//! Per-connection subscription manager.
//!
//! Tracks which channels a WebSocket client is subscribed to and
//! provides server-side event filtering.

use std::collections::HashSet;

use crate::domain::Channel;

/// Manages the set of channel subscriptions for a single WebSocket
/// connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed channels. If `subscribe_all` is true, this set is ignored.
    channels: HashSet<Channel>,
    /// Whether the client subscribes to every channel (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds channels to the subscription set.
    pub fn subscribe(&mut self, channels: &[Channel], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.channels.extend(channels.iter().copied());
    }

    /// Removes channels from the subscription set. Clearing the wildcard
    /// requires unsubscribing from `"*"` explicitly.
    pub fn unsubscribe(&mut self, channels: &[Channel], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for channel in channels {
            self.channels.remove(channel);
        }
    }

    /// Returns `true` if the given channel matches the subscription filter.
    #[must_use]
    pub fn matches(&self, channel: Channel) -> bool {
        self.subscribe_all || self.channels.contains(&channel)
    }

    /// Returns the number of explicitly subscribed channels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
