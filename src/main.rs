//! gift-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use gift_gateway::app_state::AppState;
use gift_gateway::build_app;
use gift_gateway::config::{GatewayConfig, LogFormat};
use gift_gateway::payments::{PaymentProvider, StripeClient};
use gift_gateway::store::{LedgerStore, MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting gift-gateway");

    // Build storage layer
    let store: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(
                url,
                config.database_max_connections,
                config.database_min_connections,
                Duration::from_secs(config.database_connect_timeout_secs),
            )
            .await
            .context("connecting to database")?;
            store.migrate().await.context("running migrations")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory ledger store");
            Arc::new(MemoryStore::with_default_packages().await)
        }
    };

    // Build payment provider
    let provider: Arc<dyn PaymentProvider> = Arc::new(
        StripeClient::new(
            config.stripe_secret_key.expose(),
            config.stripe_api_base.clone(),
            Duration::from_secs(config.provider_timeout_secs),
        )
        .context("building payment client")?,
    );

    // Build application state and router
    let app_state = AppState::new(&config, store, provider);
    let app = build_app(app_state, &config).context("building router")?;

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
