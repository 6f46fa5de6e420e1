//! Owner-only maintenance endpoints.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Datelike, Utc};

use crate::api::dto::MonthlyRollupRequest;
use crate::api::extract::AuthUser;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::store::RollupSummary;

/// `POST /admin/rollups/monthly`: Recompute a month's earnings rollup.
///
/// # Errors
///
/// Returns [`GatewayError::Forbidden`] for anyone but the owner.
#[utoipa::path(
    post,
    path = "/api/v1/admin/rollups/monthly",
    tag = "Admin",
    summary = "Run the monthly rollup",
    request_body = MonthlyRollupRequest,
    responses(
        (status = 200, description = "Rollup totals", body = RollupSummary),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn run_monthly_rollup(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<MonthlyRollupRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if user != state.owner_user_id {
        return Err(GatewayError::Forbidden("owner only".to_string()));
    }
    let day = req.month.unwrap_or_else(|| Utc::now().date_naive());
    let month = day.with_day(1).unwrap_or(day);
    let summary = state.store.run_monthly_rollup(month).await?;
    tracing::info!(%month, paid_records = summary.paid_records, "monthly rollup complete");
    Ok(Json(summary))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/rollups/monthly", post(run_monthly_rollup))
}
