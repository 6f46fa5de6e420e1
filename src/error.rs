//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and a flat JSON error response that
//! matches the `{ ok, error }` shape every endpoint returns.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::RecordId;
use crate::domain::money::format_usd;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "ok": false,
///   "error": "Amount must be between $1.00 and $500.00",
///   "code": 1002
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false` for errors.
    pub ok: bool,
    /// Human-readable error message.
    pub error: String,
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                      |
/// |-----------|-----------------|----------------------------------|
/// | 1000–1999 | Validation      | 400 / 403 / 429 Too Many Requests|
/// | 2000–2999 | Authorization   | 401 Unauthorized / 403 Forbidden |
/// | 3000–3999 | Ledger state    | 404 Not Found / 422 Unprocessable|
/// | 4000–4999 | Upstream        | 400 Bad Request / 502 Bad Gateway|
/// | 5000–5999 | Server          | 500 Internal Server Error        |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Gift amount outside the configured bounds.
    #[error("Amount must be between {} and {}", format_usd(*min_cents), format_usd(*max_cents))]
    AmountOutOfRange {
        /// Inclusive lower bound in cents.
        min_cents: i64,
        /// Inclusive upper bound in cents.
        max_cents: i64,
    },

    /// SKU does not resolve to an active coin package.
    #[error("unknown or inactive package: {0}")]
    UnknownPackage(String),

    /// The requested flow is switched off by configuration.
    #[error("{0} are currently disabled")]
    FeatureDisabled(&'static str),

    /// No valid session accompanied the request.
    #[error("authentication required")]
    Unauthorized,

    /// Request origin does not match the configured site.
    #[error("request origin not allowed")]
    OriginMismatch,

    /// Caller is authenticated but may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Ledger record with the given ID was not found.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// No ledger record references the given checkout session.
    #[error("checkout session not found: {0}")]
    SessionNotFound(String),

    /// Sender wallet cannot cover the gift.
    #[error("insufficient coins")]
    InsufficientCoins,

    /// Webhook signature verification failed.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Payment provider API call failed.
    #[error("payment provider error: {0}")]
    Provider(String),

    /// Client exceeded rate limit.
    #[error("Too many requests. Try again in {retry_after_secs}s.")]
    RateLimited {
        /// Seconds until the client may retry.
        retry_after_secs: u64,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::AmountOutOfRange { .. } => 1002,
            Self::UnknownPackage(_) => 1003,
            Self::FeatureDisabled(_) => 1004,
            Self::Unauthorized => 2001,
            Self::OriginMismatch => 2002,
            Self::Forbidden(_) => 2003,
            Self::RecordNotFound(_) => 3001,
            Self::SessionNotFound(_) => 3002,
            Self::InsufficientCoins => 3003,
            Self::InvalidSignature(_) => 4001,
            Self::Provider(_) => 4002,
            Self::RateLimited { .. } => 1005,
            Self::Internal(_) => 5000,
            Self::PersistenceError(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::AmountOutOfRange { .. }
            | Self::UnknownPackage(_)
            | Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::FeatureDisabled(_) | Self::OriginMismatch | Self::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RecordNotFound(_) | Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientCoins => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let retry_after = match &self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
            code: self.error_code(),
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn amount_message_formats_dollars() {
        let err = GatewayError::AmountOutOfRange {
            min_cents: 100,
            max_cents: 50_000,
        };
        assert_eq!(err.to_string(), "Amount must be between $1.00 and $500.00");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limited_sets_retry_after_header() {
        let response = GatewayError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            GatewayError::RateLimited { retry_after_secs: 1 }.error_code(),
            1005
        );
        let Some(value) = response.headers().get(header::RETRY_AFTER) else {
            panic!("missing retry-after header");
        };
        assert_eq!(value, "42");
    }

    #[test]
    fn provider_failures_map_to_bad_gateway() {
        let err = GatewayError::Provider("timeout".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_code(), 4002);
    }
}
