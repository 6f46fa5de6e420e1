//! Payment provider integration: checkout sessions, webhook events and
//! signature verification.
//!
//! [`PaymentProvider`] is the seam between the gateway and the provider's
//! REST API. [`stripe::StripeClient`] is the production implementation.

pub mod event;
pub mod signature;
pub mod stripe;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{IdempotencyKey, RecordId, RecordKind, UserId};
use crate::error::GatewayError;

pub use event::ProviderEvent;
pub use signature::SignatureVerifier;
pub use stripe::StripeClient;

/// Metadata key carrying the ledger record id.
pub const META_RECORD_ID: &str = "record_id";
/// Metadata key carrying the paying user id.
pub const META_USER_ID: &str = "user_id";
/// Metadata key carrying the checkout idempotency key.
pub const META_IDEMPOTENCY_KEY: &str = "idempotency_key";
/// Metadata key carrying the record kind.
pub const META_KIND: &str = "kind";

/// Values attached to a checkout session so that webhooks can find their
/// ledger record again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    /// Ledger record the session pays for.
    pub record_id: RecordId,
    /// Paying member, if signed in.
    pub user_id: Option<UserId>,
    /// Key guarding the eventual credit.
    pub idempotency_key: IdempotencyKey,
    /// Record kind.
    pub kind: RecordKind,
}

impl SessionMetadata {
    /// Flattens the metadata into provider key/value pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (META_RECORD_ID, self.record_id.to_string()),
            (META_IDEMPOTENCY_KEY, self.idempotency_key.to_string()),
            (META_KIND, self.kind.as_str().to_string()),
        ];
        if let Some(user) = self.user_id {
            pairs.push((META_USER_ID, user.to_string()));
        }
        pairs
    }
}

/// Parameters for a one-off payment checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionParams {
    /// Line item label shown on the hosted page.
    pub product_name: String,
    /// Price in cents.
    pub amount_cents: i64,
    /// ISO currency code.
    pub currency: &'static str,
    /// Redirect after success; may contain the provider's session
    /// placeholder.
    pub success_url: String,
    /// Redirect after abandoning the page.
    pub cancel_url: String,
    /// Ledger linkage.
    pub metadata: SessionMetadata,
}

/// A freshly created hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Provider session id.
    pub id: String,
    /// Hosted page URL to redirect the member to.
    pub url: String,
}

/// A checkout session as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ProviderSession {
    /// Provider session id.
    pub id: String,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: String,
    /// Payment intent created for the session.
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Metadata echoed back from session creation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderSession {
    /// `true` once funds are captured.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(self.payment_status.as_str(), "paid" | "no_payment_required")
    }

    /// Ledger record id from metadata, if present and well formed.
    #[must_use]
    pub fn record_id(&self) -> Option<RecordId> {
        self.metadata.get(META_RECORD_ID)?.parse().ok()
    }
}

/// Operations the gateway needs from the payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync + std::fmt::Debug {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Opens a hosted checkout session.
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Fetches the current state of a checkout session.
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<ProviderSession, GatewayError>;
}
