//! Wallet read handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::extract::AuthUser;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::store::WalletBalance;

/// `GET /wallet`: Current member's coin balance.
///
/// # Errors
///
/// Returns [`GatewayError`] if the caller is not signed in or the store
/// fails.
#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    tag = "Wallet",
    summary = "Get wallet balance",
    responses(
        (status = 200, description = "Wallet balance", body = WalletBalance),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn get_wallet(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.get_wallet(user).await?))
}

/// Wallet routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/wallet", get(get_wallet))
}
