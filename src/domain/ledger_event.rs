//! Domain events reflecting ledger state changes.
//!
//! Every durable transition emits a [`LedgerEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers of
//! the live overlay and feed pages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{GiftRecord, GiftTarget, RecordId, RecordKind, Unit};

/// Audience an event is relevant to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// The live stream overlay.
    Live,
    /// A specific feed post.
    Post(uuid::Uuid),
    /// Ledger bookkeeping with no public audience.
    Ledger,
}

impl Channel {
    /// Parses a subscription string: `"live"`, `"ledger"` or `"post:<uuid>"`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "live" => Some(Self::Live),
            "ledger" => Some(Self::Ledger),
            other => other
                .strip_prefix("post:")
                .and_then(|id| id.parse().ok())
                .map(Self::Post),
        }
    }

    /// Inverse of [`Channel::parse`].
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Live => "live".to_string(),
            Self::Ledger => "ledger".to_string(),
            Self::Post(id) => format!("post:{id}"),
        }
    }
}

impl From<GiftTarget> for Channel {
    fn from(target: GiftTarget) -> Self {
        match target {
            GiftTarget::Live => Self::Live,
            GiftTarget::Post(id) => Self::Post(id),
            GiftTarget::Wallet => Self::Ledger,
        }
    }
}

/// Domain event emitted after a ledger transition or its side effects.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A provider-mediated record settled.
    GiftPaid {
        /// Ledger record.
        record_id: RecordId,
        /// Movement kind.
        kind: RecordKind,
        /// Amount in minor units.
        amount: i64,
        /// Unit of `amount`.
        unit: Unit,
        /// Attached entity.
        target: GiftTarget,
        /// Settlement timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A pending record expired.
    GiftCanceled {
        /// Ledger record.
        record_id: RecordId,
        /// Attached entity.
        target: GiftTarget,
        /// Cancellation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Coins moved from a member to the owner.
    CoinGiftSent {
        /// Gift transaction id returned by the store.
        gift_id: RecordId,
        /// Gift style chosen by the sender (e.g. `"rose"`).
        gift_type: String,
        /// Coins moved.
        coins: i64,
        /// Attached entity.
        target: GiftTarget,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A system message was posted to live chat.
    ChatAnnouncement {
        /// Live session the message belongs to.
        live_session_id: uuid::Uuid,
        /// Message text.
        body: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Builds a [`LedgerEvent::GiftPaid`] from a settled record.
    #[must_use]
    pub fn paid(record: &GiftRecord) -> Self {
        Self::GiftPaid {
            record_id: record.id,
            kind: record.kind,
            amount: record.amount,
            unit: record.unit,
            target: record.target,
            timestamp: record.paid_at.unwrap_or_else(Utc::now),
        }
    }

    /// Returns the channel the event is published on.
    #[must_use]
    pub fn channel(&self) -> Channel {
        match self {
            Self::GiftPaid { target, .. }
            | Self::GiftCanceled { target, .. }
            | Self::CoinGiftSent { target, .. } => Channel::from(*target),
            Self::ChatAnnouncement { .. } => Channel::Live,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::GiftPaid { .. } => "gift_paid",
            Self::GiftCanceled { .. } => "gift_canceled",
            Self::CoinGiftSent { .. } => "coin_gift_sent",
            Self::ChatAnnouncement { .. } => "chat_announcement",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_parse_round_trip() {
        let post = uuid::Uuid::new_v4();
        for channel in [Channel::Live, Channel::Ledger, Channel::Post(post)] {
            assert_eq!(Channel::parse(&channel.label()), Some(channel));
        }
        assert_eq!(Channel::parse("post:nope"), None);
        assert_eq!(Channel::parse("everything"), None);
    }

    #[test]
    fn paid_event_uses_record_target_channel() {
        let record = GiftRecord::pending(None, RecordKind::Tip, Unit::Usd, 300, "live", GiftTarget::Live)
            .settled_now();
        let event = LedgerEvent::paid(&record);
        assert_eq!(event.channel(), Channel::Live);
        assert_eq!(event.event_type_str(), "gift_paid");
    }

    #[test]
    fn chat_announcement_serializes_with_tag() {
        let event = LedgerEvent::ChatAnnouncement {
            live_session_id: uuid::Uuid::nil(),
            body: "Anonymous tipped $5.00".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event_type\":\"chat_announcement\""));
        assert!(json.contains("$5.00"));
    }
}
