//! # gift-gateway
//!
//! Checkout, webhook reconciliation and coin gifting for a membership
//! community.
//!
//! Balances, idempotent transactions and rollups live in an external
//! database reached through the [`store::LedgerStore`] RPC surface; payments
//! go through a hosted checkout provider. This crate coordinates the two so
//! that every payment is credited exactly once, whether the provider's
//! webhook or the member's return page gets there first.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)      Payment provider (webhooks)
//!     │                                │
//!     ├── REST Handlers (api/) ────────┤
//!     ├── WS Handler (ws/)             │
//!     │                                │
//!     ├── CheckoutService / Reconciler / GiftService (service/)
//!     ├── EventBus, RateLimiter (domain/)
//!     │
//!     ├── PaymentProvider (payments/)
//!     └── LedgerStore: PostgreSQL or in-memory (store/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod payments;
pub mod service;
pub mod store;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Builds the full HTTP application: REST routes, `/ws`, Swagger UI (with
/// the `swagger-ui` feature) and the tower middleware stack.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if the site origin is not a valid
/// header value.
pub fn build_app(state: AppState, config: &GatewayConfig) -> Result<Router, GatewayError> {
    let origin = HeaderValue::from_str(&config.site_origin)
        .map_err(|e| GatewayError::Internal(format!("invalid site origin: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let router = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws::handler::ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    Ok(router
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
