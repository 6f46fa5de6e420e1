//! Gift/transaction ledger records.
//!
//! A [`GiftRecord`] is one monetary or coin movement. Records are created
//! `pending` (or `paid` for synchronous coin gifts), move to a terminal
//! status exactly once, and are never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{IdempotencyKey, RecordId, UserId};

/// Lifecycle status of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Created, waiting on the payment provider.
    Pending,
    /// Payment confirmed; credit applied.
    Paid,
    /// Checkout expired or was abandoned.
    Canceled,
}

impl RecordStatus {
    /// Database/JSON representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
        }
    }

    /// Parses the database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// `true` for `paid` and `canceled`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Canceled)
    }
}

/// Currency or unit the record's `amount` is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// US dollars, amount in cents.
    Usd,
    /// Virtual coins.
    Coins,
}

impl Unit {
    /// Database/JSON representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Coins => "coins",
        }
    }

    /// Parses the database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "usd" => Some(Self::Usd),
            "coins" => Some(Self::Coins),
            _ => None,
        }
    }
}

/// What kind of movement the record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Buying a coin package through the payment provider.
    CoinPurchase,
    /// A USD tip paid through the payment provider.
    Tip,
    /// Coins moved from a member's wallet to the owner.
    CoinGift,
}

impl RecordKind {
    /// Database/JSON representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CoinPurchase => "coin_purchase",
            Self::Tip => "tip",
            Self::CoinGift => "coin_gift",
        }
    }

    /// Parses the database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "coin_purchase" => Some(Self::CoinPurchase),
            "tip" => Some(Self::Tip),
            "coin_gift" => Some(Self::CoinGift),
            _ => None,
        }
    }
}

/// The entity a record is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum GiftTarget {
    /// Not attached to anything (coin purchases).
    Wallet,
    /// Whatever live session is active when the payment lands.
    Live,
    /// A specific feed post.
    Post(uuid::Uuid),
}

impl GiftTarget {
    /// Database discriminator.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Live => "live",
            Self::Post(_) => "post",
        }
    }

    /// The post id, for post targets.
    #[must_use]
    pub const fn post_id(&self) -> Option<uuid::Uuid> {
        match self {
            Self::Post(id) => Some(*id),
            _ => None,
        }
    }

    /// Rebuilds a target from its database columns.
    #[must_use]
    pub fn from_parts(kind: &str, post_id: Option<uuid::Uuid>) -> Option<Self> {
        match (kind, post_id) {
            ("wallet", _) => Some(Self::Wallet),
            ("live", _) => Some(Self::Live),
            ("post", Some(id)) => Some(Self::Post(id)),
            _ => None,
        }
    }
}

/// One monetary or coin movement in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GiftRecord {
    /// Gateway-generated primary key.
    pub id: RecordId,
    /// Paying member; `None` for anonymous tips.
    pub user_id: Option<UserId>,
    /// Movement kind.
    pub kind: RecordKind,
    /// Unit of `amount`.
    pub unit: Unit,
    /// Amount in minor units (cents or coins).
    pub amount: i64,
    /// Coins credited to the payer when a purchase settles.
    pub coins: i64,
    /// Free-text origin, e.g. `"checkout:coins_500"`.
    pub source: String,
    /// Attached entity.
    pub target: GiftTarget,
    /// Whether the payer asked to stay anonymous.
    pub anonymous: bool,
    /// Lifecycle status.
    pub status: RecordStatus,
    /// Key guarding the credit applied on settlement.
    pub idempotency_key: IdempotencyKey,
    /// Provider checkout session, once created.
    pub checkout_session_id: Option<String>,
    /// Provider payment intent, once paid.
    pub payment_intent_id: Option<String>,
    /// Provider event that caused the paid transition.
    pub provider_event_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Settlement timestamp.
    pub paid_at: Option<DateTime<Utc>>,
}

impl GiftRecord {
    /// Builds a fresh `pending` record with a generated id.
    #[must_use]
    pub fn pending(
        user_id: Option<UserId>,
        kind: RecordKind,
        unit: Unit,
        amount: i64,
        source: impl Into<String>,
        target: GiftTarget,
    ) -> Self {
        Self {
            id: RecordId::new(),
            user_id,
            kind,
            unit,
            amount,
            coins: 0,
            source: source.into(),
            target,
            anonymous: false,
            status: RecordStatus::Pending,
            idempotency_key: IdempotencyKey::generate(),
            checkout_session_id: None,
            payment_intent_id: None,
            provider_event_id: None,
            created_at: Utc::now(),
            paid_at: None,
        }
    }

    /// Sets the coins credited on settlement.
    #[must_use]
    pub fn with_coins(mut self, coins: i64) -> Self {
        self.coins = coins;
        self
    }

    /// Marks the record anonymous.
    #[must_use]
    pub fn with_anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    /// Replaces the generated idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Turns a freshly built record into an already-settled one.
    #[must_use]
    pub fn settled_now(mut self) -> Self {
        self.status = RecordStatus::Paid;
        self.paid_at = Some(Utc::now());
        self
    }

    /// `true` once the record is `paid`.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == RecordStatus::Paid
    }

    /// `true` if `event_id` is the event that already settled this record.
    #[must_use]
    pub fn was_settled_by(&self, event_id: &str) -> bool {
        self.provider_event_id.as_deref() == Some(event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_record_defaults() {
        let record = GiftRecord::pending(None, RecordKind::Tip, Unit::Usd, 500, "live", GiftTarget::Live);
        assert_eq!(record.status, RecordStatus::Pending);
        assert!(record.paid_at.is_none());
        assert!(!record.is_paid());
    }

    #[test]
    fn duplicate_event_detection() {
        let mut record =
            GiftRecord::pending(None, RecordKind::Tip, Unit::Usd, 500, "live", GiftTarget::Live);
        assert!(!record.was_settled_by("evt_1"));
        record.provider_event_id = Some("evt_1".to_string());
        assert!(record.was_settled_by("evt_1"));
        assert!(!record.was_settled_by("evt_2"));
    }

    #[test]
    fn target_round_trips_through_columns() {
        let post = uuid::Uuid::new_v4();
        for target in [GiftTarget::Wallet, GiftTarget::Live, GiftTarget::Post(post)] {
            assert_eq!(
                GiftTarget::from_parts(target.kind_str(), target.post_id()),
                Some(target)
            );
        }
        assert_eq!(GiftTarget::from_parts("post", None), None);
    }

    #[test]
    fn status_terminality() {
        assert!(!RecordStatus::Pending.is_terminal());
        assert!(RecordStatus::Paid.is_terminal());
        assert!(RecordStatus::Canceled.is_terminal());
        assert_eq!(RecordStatus::parse("paid"), Some(RecordStatus::Paid));
        assert_eq!(RecordStatus::parse("refunded"), None);
    }
}
