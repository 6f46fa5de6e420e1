//! Checkout handlers: coin packages, tips and client-side finalize.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{
    CheckoutResponse, CoinCheckoutRequest, FinalizeRequest, FinalizeResponse, GiftCheckoutRequest,
};
use crate::api::extract::{ClientIp, MaybeUser};
use crate::api::guard::SameOrigin;
use crate::app_state::AppState;
use crate::domain::{RateLimitKey, ReturnPath, UserId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::CheckoutOrder;

fn rate_limit(state: &AppState, user: Option<UserId>, ip: &str) -> Result<(), GatewayError> {
    let label = user.map_or_else(|| "anon".to_string(), |u| u.to_string());
    state.rate_limiter.check(&RateLimitKey::new(label, ip)).inspect_err(|_| {
        tracing::info!(user = ?user, ip, "checkout rate limited");
    })
}

/// `POST /checkout/coins`: Start a coin package purchase.
///
/// # Errors
///
/// Returns [`GatewayError`] on origin mismatch, missing session, rate
/// limiting, unknown package, or provider failure.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/coins",
    tag = "Checkout",
    summary = "Buy a coin package",
    description = "Records a pending purchase and returns the hosted checkout URL. The wallet is credited once the provider confirms payment.",
    request_body = CoinCheckoutRequest,
    responses(
        (status = 200, description = "Checkout opened", body = CheckoutResponse),
        (status = 400, description = "Unknown package", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Origin mismatch or purchases disabled", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 502, description = "Payment provider failure", body = ErrorResponse),
    )
)]
pub async fn checkout_coins(
    _origin: SameOrigin,
    MaybeUser(user): MaybeUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Json(req): Json<CoinCheckoutRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let user = user.ok_or(GatewayError::Unauthorized)?;
    rate_limit(&state, Some(user), &ip)?;

    let started = state
        .checkout
        .start_checkout(
            Some(user),
            CheckoutOrder::CoinPackage { sku: req.sku },
            &ReturnPath::sanitize(req.return_path.as_deref()),
        )
        .await?;
    Ok(Json(CheckoutResponse::from(started)))
}

/// `POST /checkout/gift`: Start a USD tip.
///
/// # Errors
///
/// Returns [`GatewayError`] on origin mismatch, missing session, rate
/// limiting, out-of-range amount, or provider failure.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/gift",
    tag = "Checkout",
    summary = "Tip in USD",
    description = "Records a pending tip for the live stream or a post and returns the hosted checkout URL. Signed-out visitors may tip when anonymous gifts are enabled.",
    request_body = GiftCheckoutRequest,
    responses(
        (status = 200, description = "Checkout opened", body = CheckoutResponse),
        (status = 400, description = "Amount out of range", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Origin mismatch or gifts disabled", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 502, description = "Payment provider failure", body = ErrorResponse),
    )
)]
pub async fn checkout_gift(
    _origin: SameOrigin,
    MaybeUser(user): MaybeUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Json(req): Json<GiftCheckoutRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if user.is_none() && !state.checkout.settings().allow_anonymous_gifts {
        return Err(GatewayError::Unauthorized);
    }
    rate_limit(&state, user, &ip)?;

    let order = CheckoutOrder::Tip {
        amount_cents: req.amount_cents,
        post_id: req.post_id,
        anonymous: req.anonymous,
    };
    let started = state
        .checkout
        .start_checkout(user, order, &ReturnPath::sanitize(req.return_path.as_deref()))
        .await?;
    Ok(Json(CheckoutResponse::from(started)))
}

/// `POST /checkout/finalize`: Settle a paid session from the return page.
///
/// # Errors
///
/// Returns [`GatewayError`] if the session is unknown, belongs to another
/// member, or the provider cannot be reached.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/finalize",
    tag = "Checkout",
    summary = "Finalize a checkout",
    description = "Fallback for delayed webhooks: asks the provider for the session state and settles the record if paid. Safe to call repeatedly.",
    request_body = FinalizeRequest,
    responses(
        (status = 200, description = "Current record status", body = FinalizeResponse),
        (status = 403, description = "Session belongs to another member", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 502, description = "Payment provider failure", body = ErrorResponse),
    )
)]
pub async fn finalize_checkout(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    Json(req): Json<FinalizeRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let result = state
        .reconciler
        .finalize_session(user, &req.session_id)
        .await?;
    Ok(Json(FinalizeResponse {
        ok: true,
        status: result.status,
    }))
}

/// Checkout routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/coins", post(checkout_coins))
        .route("/checkout/gift", post(checkout_gift))
        .route("/checkout/finalize", post(finalize_checkout))
}
