//! Admin request bodies.

use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

/// Body of `POST /admin/rollups/monthly`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MonthlyRollupRequest {
    /// Any day in the month to roll up; defaults to the current month.
    #[serde(default)]
    pub month: Option<NaiveDate>,
}
