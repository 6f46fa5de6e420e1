//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::AuthVerifier;
use crate::config::GatewayConfig;
use crate::domain::{EventBus, RateLimiter, UserId};
use crate::payments::{PaymentProvider, SignatureVerifier};
use crate::service::{CheckoutService, CheckoutSettings, GiftService, Reconciler};
use crate::store::LedgerStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Ledger store for reads that need no orchestration.
    pub store: Arc<dyn LedgerStore>,
    /// Checkout initiation.
    pub checkout: Arc<CheckoutService>,
    /// Webhook and finalize reconciliation.
    pub reconciler: Arc<Reconciler>,
    /// Coin-to-coin gifts.
    pub gifts: Arc<GiftService>,
    /// Checkout rate limiter.
    pub rate_limiter: Arc<RateLimiter>,
    /// Access-token verification.
    pub auth: Arc<AuthVerifier>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// `scheme://host[:port]` browser requests must come from.
    pub site_origin: Arc<str>,
    /// Account allowed to run admin operations.
    pub owner_user_id: UserId,
    /// Read the client address from proxy headers instead of the peer.
    pub trust_proxy_headers: bool,
}

impl AppState {
    /// Wires the services over `store` and `provider` according to
    /// `config`.
    #[must_use]
    pub fn new(
        config: &GatewayConfig,
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let checkout = CheckoutService::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            CheckoutSettings {
                site_url: config.site_url.clone(),
                bounds: config.gift_bounds,
                gifts_enabled: config.gifts_enabled,
                coin_purchases_enabled: config.coin_purchases_enabled,
                allow_anonymous_gifts: config.allow_anonymous_gifts,
            },
        );
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            provider,
            event_bus.clone(),
            SignatureVerifier::new(
                config.stripe_webhook_secret.expose(),
                config.webhook_tolerance_secs,
            ),
        );
        let gifts = GiftService::new(
            Arc::clone(&store),
            event_bus.clone(),
            config.owner_user_id,
            config.gifts_enabled,
        );
        Self {
            store,
            checkout: Arc::new(checkout),
            reconciler: Arc::new(reconciler),
            gifts: Arc::new(gifts),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_window(),
                config.rate_limit_max_requests,
            )),
            auth: Arc::new(AuthVerifier::new(config.auth_jwt_secret.expose())),
            event_bus,
            site_origin: Arc::from(config.site_origin.as_str()),
            owner_user_id: config.owner_user_id,
            trust_proxy_headers: config.trust_proxy_headers,
        }
    }
}
