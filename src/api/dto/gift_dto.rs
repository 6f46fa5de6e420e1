//! Coin gift request and response bodies.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::UserId;
use crate::service::{GiftRequest, GiftSent};
use crate::store::{GiftReceipt, WalletBalance};

/// Body of `POST /gifts/coins`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CoinGiftRequest {
    /// Stream the gift is sent from.
    #[serde(default)]
    pub stream_id: Option<String>,
    /// Post the gift is attached to.
    #[serde(default)]
    pub post_id: Option<uuid::Uuid>,
    /// Gift style, e.g. `"rose"`.
    pub gift_type: String,
    /// Coins to send; fractions are truncated.
    pub coins: f64,
    /// Retry guard, unique per gift.
    pub idempotency_key: String,
    /// Ignored; every gift goes to the owner.
    #[serde(default)]
    pub recipient_id: Option<UserId>,
}

impl From<CoinGiftRequest> for GiftRequest {
    fn from(req: CoinGiftRequest) -> Self {
        Self {
            stream_id: req.stream_id,
            post_id: req.post_id,
            gift_type: req.gift_type,
            coins: req.coins,
            idempotency_key: req.idempotency_key,
            recipient_id: req.recipient_id,
        }
    }
}

/// Response of `POST /gifts/coins`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CoinGiftResponse {
    /// Always `true` on success.
    pub ok: bool,
    /// Gift receipt.
    pub gift: GiftReceipt,
    /// Sender's wallet after the gift.
    pub wallet: WalletBalance,
    /// Post the gift was attached to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<uuid::Uuid>,
}

impl From<GiftSent> for CoinGiftResponse {
    fn from(sent: GiftSent) -> Self {
        Self {
            ok: true,
            gift: sent.receipt,
            wallet: sent.wallet,
            post_id: sent.post_id,
        }
    }
}
