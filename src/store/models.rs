//! Input and output contracts of the ledger store's RPC surface.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{GiftRecord, GiftTarget, IdempotencyKey, RecordId, UserId};

/// A purchasable coin package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CoinPackage {
    /// Stock keeping unit, e.g. `"coins_500"`.
    pub sku: String,
    /// Coins credited on purchase.
    pub coins: i64,
    /// Price in cents.
    pub price_cents: i64,
    /// Whether the package can currently be bought.
    pub active: bool,
}

/// A member's coin holdings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WalletBalance {
    /// Wallet owner.
    pub user_id: UserId,
    /// Current coin balance.
    pub coins: i64,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// The live session currently on air.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSession {
    /// Session id (chat messages hang off it).
    pub id: uuid::Uuid,
    /// Stream the session belongs to.
    pub stream_id: String,
    /// When the session went live.
    pub started_at: DateTime<Utc>,
}

/// A system-authored live chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Target live session.
    pub live_session_id: uuid::Uuid,
    /// Message text.
    pub body: String,
}

/// A visible comment on a feed post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostComment {
    /// Target post.
    pub post_id: uuid::Uuid,
    /// Comment author.
    pub author_id: UserId,
    /// Comment text.
    pub body: String,
}

/// Arguments of the `send_gift` RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinGift {
    /// Member paying the coins.
    pub sender: UserId,
    /// Account receiving the coins.
    pub recipient: UserId,
    /// Whole coins to move.
    pub coins: i64,
    /// Gift style, e.g. `"rose"`.
    pub gift_type: String,
    /// Attached entity.
    pub target: GiftTarget,
    /// Stream the gift was sent from, if any.
    pub stream_id: Option<String>,
    /// Caller-supplied retry guard.
    pub idempotency_key: IdempotencyKey,
}

/// Result of the `send_gift` RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GiftReceipt {
    /// Transaction id.
    pub gift_id: RecordId,
    /// Coins moved.
    pub coins: i64,
    /// Gift style.
    pub gift_type: String,
    /// Account credited.
    pub recipient: UserId,
    /// `true` when the key had already been applied and nothing moved.
    pub replayed: bool,
    /// When the original transaction was applied.
    pub created_at: DateTime<Utc>,
}

/// Provider facts recorded on a paid transition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settlement {
    /// Event that confirmed payment; `None` when finalized by the client.
    pub event_id: Option<String>,
    /// Provider payment intent.
    pub payment_intent_id: Option<String>,
    /// Provider checkout session.
    pub session_id: Option<String>,
}

/// Outcome of a status-guarded `pending → paid` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// This call performed the transition.
    Applied(GiftRecord),
    /// The record was already paid; nothing changed.
    AlreadyPaid(GiftRecord),
    /// The record was canceled; it stays canceled.
    Canceled(GiftRecord),
}

impl SettleOutcome {
    /// The record as it is after the call.
    #[must_use]
    pub fn record(&self) -> &GiftRecord {
        match self {
            Self::Applied(r) | Self::AlreadyPaid(r) | Self::Canceled(r) => r,
        }
    }
}

/// Outcome of a status-guarded `pending → canceled` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// This call performed the transition.
    Canceled(GiftRecord),
    /// The record was already terminal; nothing changed.
    Unchanged(GiftRecord),
}

/// Totals produced by the monthly rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RollupSummary {
    /// First day of the rolled-up month.
    pub month: NaiveDate,
    /// Paid records in the month.
    pub paid_records: i64,
    /// Sum of USD amounts in cents.
    pub usd_cents: i64,
    /// Sum of coin amounts.
    pub coins: i64,
}
