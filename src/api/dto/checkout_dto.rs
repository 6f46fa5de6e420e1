//! Checkout request and response bodies.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{IdempotencyKey, RecordStatus};
use crate::service::CheckoutStarted;

/// Body of `POST /checkout/coins`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CoinCheckoutRequest {
    /// Coin package SKU, e.g. `"coins_500"`.
    pub sku: String,
    /// Relative path to come back to after checkout.
    #[serde(default)]
    pub return_path: Option<String>,
}

/// Body of `POST /checkout/gift`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GiftCheckoutRequest {
    /// Tip amount in cents.
    pub amount_cents: i64,
    /// Relative path to come back to after checkout.
    #[serde(default)]
    pub return_path: Option<String>,
    /// Post to attach the tip to; omitted for live tips.
    #[serde(default)]
    pub post_id: Option<uuid::Uuid>,
    /// Hide the tipper's name in announcements.
    #[serde(default)]
    pub anonymous: bool,
}

/// Response of both checkout endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    /// Hosted checkout page to redirect to.
    pub url: String,
    /// Provider session id.
    pub session_id: String,
    /// Key guarding the eventual credit.
    pub idempotency_key: IdempotencyKey,
}

impl From<CheckoutStarted> for CheckoutResponse {
    fn from(started: CheckoutStarted) -> Self {
        Self {
            url: started.url,
            session_id: started.session_id,
            idempotency_key: started.idempotency_key,
        }
    }
}

/// Body of `POST /checkout/finalize`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FinalizeRequest {
    /// Provider session id from the return URL.
    pub session_id: String,
}

/// Response of `POST /checkout/finalize`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinalizeResponse {
    /// Always `true` on success.
    pub ok: bool,
    /// Record status after the call.
    pub status: RecordStatus,
}
