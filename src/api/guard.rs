//! Same-origin guard for browser-initiated mutations.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::{ORIGIN, REFERER};
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Passes only when `Origin` (or, without it, `Referer`) belongs to the
/// configured site.
#[derive(Debug, Clone, Copy)]
pub struct SameOrigin;

/// Checks the request's origin against `site_origin`.
///
/// # Errors
///
/// Returns [`GatewayError::OriginMismatch`] if neither header is present
/// or the origin differs.
pub fn check_origin(headers: &HeaderMap, site_origin: &str) -> Result<(), GatewayError> {
    let claimed = headers
        .get(ORIGIN)
        .or_else(|| headers.get(REFERER))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| reqwest::Url::parse(v).ok())
        .map(|url| url.origin().ascii_serialization());
    match claimed {
        Some(origin) if origin == site_origin => Ok(()),
        other => {
            tracing::warn!(origin = ?other, "cross-origin request rejected");
            Err(GatewayError::OriginMismatch)
        }
    }
}

impl FromRequestParts<AppState> for SameOrigin {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        check_origin(&parts.headers, &state.site_origin).map(|()| Self)
    }
}
