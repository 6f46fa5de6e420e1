//! Coin-to-coin gift handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CoinGiftRequest, CoinGiftResponse};
use crate::api::extract::AuthUser;
use crate::api::guard::SameOrigin;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /gifts/coins`: Send coins to the owner.
///
/// # Errors
///
/// Returns [`GatewayError`] on origin mismatch, missing session, invalid
/// input, or insufficient balance.
#[utoipa::path(
    post,
    path = "/api/v1/gifts/coins",
    tag = "Gifts",
    summary = "Send a coin gift",
    description = "Debits the sender and credits the owner atomically. Repeating an idempotency key returns the original gift without moving coins again.",
    request_body = CoinGiftRequest,
    responses(
        (status = 200, description = "Gift sent or replayed", body = CoinGiftResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 422, description = "Insufficient coins", body = ErrorResponse),
    )
)]
pub async fn send_coin_gift(
    _origin: SameOrigin,
    AuthUser(sender): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CoinGiftRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let sent = state.gifts.send_coin_gift(sender, req.into()).await?;
    Ok(Json(CoinGiftResponse::from(sent)))
}

/// Gift routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/gifts/coins", post(send_coin_gift))
}
