//! Ledger store: the typed RPC surface of the managed backend.
//!
//! Balances, idempotent transactions and rollups live in the external
//! database. The gateway reaches them only through [`LedgerStore`], whose
//! named operations each have a fixed input/output contract. Two
//! implementations exist: [`postgres::PostgresStore`] for production and
//! [`memory::MemoryStore`] for local development and tests.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{GiftRecord, RecordId, UserId};
use crate::error::GatewayError;

pub use memory::MemoryStore;
pub use models::{
    CancelOutcome, ChatMessage, CoinGift, CoinPackage, GiftReceipt, LiveSession, PostComment,
    RollupSummary, SettleOutcome, Settlement, WalletBalance,
};
pub use postgres::PostgresStore;

/// Capability interface over the external store.
///
/// Every mutation that touches a [`GiftRecord`] is status-guarded: the
/// store compares the current status before writing, so concurrent
/// webhook and client-finalize calls converge on one terminal state.
#[async_trait]
pub trait LedgerStore: Send + Sync + std::fmt::Debug {
    /// Resolves a coin package by SKU.
    async fn get_coin_package(&self, sku: &str) -> Result<Option<CoinPackage>, GatewayError>;

    /// Appends a new ledger record.
    async fn insert_record(&self, record: &GiftRecord) -> Result<(), GatewayError>;

    /// Stores the provider session id on a record.
    async fn attach_checkout_session(
        &self,
        id: RecordId,
        session_id: &str,
    ) -> Result<(), GatewayError>;

    /// Loads a record by id.
    async fn find_record(&self, id: RecordId) -> Result<Option<GiftRecord>, GatewayError>;

    /// Loads the record a checkout session was opened for.
    async fn find_record_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GiftRecord>, GatewayError>;

    /// Moves a record from `pending` to `paid` and, for coin purchases,
    /// credits the payer's wallet in the same transaction, keyed by the
    /// record's idempotency key.
    ///
    /// Fails with [`GatewayError::RecordNotFound`] for unknown ids.
    async fn settle_record(
        &self,
        id: RecordId,
        settlement: &Settlement,
    ) -> Result<SettleOutcome, GatewayError>;

    /// Moves a record from `pending` to `canceled`; terminal records are
    /// left untouched.
    async fn cancel_record(&self, id: RecordId) -> Result<CancelOutcome, GatewayError>;

    /// Debits the sender, credits the recipient and appends the
    /// transaction atomically. A repeated idempotency key returns the
    /// original receipt with `replayed = true` and moves nothing.
    async fn send_gift(&self, gift: &CoinGift) -> Result<GiftReceipt, GatewayError>;

    /// Reads a member's wallet.
    async fn get_wallet(&self, user: UserId) -> Result<WalletBalance, GatewayError>;

    /// Returns the live session currently on air, if any.
    async fn get_live_state(&self) -> Result<Option<LiveSession>, GatewayError>;

    /// Posts a system message to live chat.
    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), GatewayError>;

    /// Adds a comment to a feed post.
    async fn insert_post_comment(&self, comment: &PostComment) -> Result<(), GatewayError>;

    /// Public display name from the member's profile.
    async fn get_display_name(&self, user: UserId) -> Result<Option<String>, GatewayError>;

    /// Recomputes the monthly earnings rollup for the month containing
    /// `month`.
    async fn run_monthly_rollup(&self, month: NaiveDate) -> Result<RollupSummary, GatewayError>;
}
