//! Payment provider webhook endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::OkResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::payments::signature::SIGNATURE_HEADER;

/// `POST /webhooks/stripe`: Receive a signed provider event.
///
/// The raw body is handed to the reconciler untouched; signature checks
/// need the exact bytes the provider signed.
///
/// # Errors
///
/// Returns `400` for bad signatures and `500` when the ledger
/// write fails, so the provider retries.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/stripe",
    tag = "Webhooks",
    summary = "Payment provider webhook",
    description = "Verifies the `Stripe-Signature` header and applies checkout completion or expiry to the ledger exactly once. Duplicate and unknown events are acknowledged.",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged", body = OkResponse),
        (status = 400, description = "Invalid signature", body = ErrorResponse),
        (status = 500, description = "Ledger write failed", body = ErrorResponse),
    )
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = state.reconciler.handle_webhook(signature, &body).await?;
    tracing::debug!(?outcome, "webhook handled");
    Ok(Json(OkResponse::ACK))
}

/// Webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/stripe", post(stripe_webhook))
}
