//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::{
    CheckoutResponse, CoinCheckoutRequest, CoinGiftRequest, CoinGiftResponse, FinalizeRequest,
    FinalizeResponse, GiftCheckoutRequest, MonthlyRollupRequest, OkResponse,
};
use crate::api::handlers::{admin, checkout, gift, system, wallet, webhook};
use crate::domain::{IdempotencyKey, RecordId, RecordStatus, UserId};
use crate::error::ErrorResponse;
use crate::store::{GiftReceipt, RollupSummary, WalletBalance};

/// Generated OpenAPI specification.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "gift-gateway",
        description = "Checkout, webhook reconciliation and coin gifting for a membership community.\n\nErrors are returned as `{ ok: false, error, code }`; rate-limited requests carry a `Retry-After` header."
    ),
    paths(
        checkout::checkout_coins,
        checkout::checkout_gift,
        checkout::finalize_checkout,
        webhook::stripe_webhook,
        gift::send_coin_gift,
        wallet::get_wallet,
        admin::run_monthly_rollup,
        system::health_handler,
    ),
    components(schemas(
        CoinCheckoutRequest,
        GiftCheckoutRequest,
        CheckoutResponse,
        FinalizeRequest,
        FinalizeResponse,
        CoinGiftRequest,
        CoinGiftResponse,
        MonthlyRollupRequest,
        OkResponse,
        GiftReceipt,
        WalletBalance,
        RollupSummary,
        RecordStatus,
        RecordId,
        UserId,
        IdempotencyKey,
        ErrorResponse,
        system::HealthResponse,
    )),
    tags(
        (name = "Checkout", description = "Hosted checkout for coin packages and tips"),
        (name = "Webhooks", description = "Signed payment provider events"),
        (name = "Gifts", description = "Coin-to-coin gifts"),
        (name = "Wallet", description = "Coin balances"),
        (name = "Admin", description = "Owner-only maintenance"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/checkout/coins",
            "/api/v1/checkout/gift",
            "/api/v1/checkout/finalize",
            "/api/v1/webhooks/stripe",
            "/api/v1/gifts/coins",
            "/api/v1/wallet",
            "/api/v1/admin/rollups/monthly",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
