//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Payment and identity secrets are
//! required and the gateway refuses to start without them; everything else
//! falls back to a default.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::{AmountBounds, UserId};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// A variable is set but unusable.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// A secret string that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// PostgreSQL connection string; `None` runs on the in-memory store.
    pub database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Minimum idle connections in the pool.
    pub database_min_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Payment provider secret API key.
    pub stripe_secret_key: Secret,

    /// Webhook signing secret.
    pub stripe_webhook_secret: Secret,

    /// Payment provider API origin.
    pub stripe_api_base: String,

    /// Accepted clock skew for webhook signatures, in seconds.
    pub webhook_tolerance_secs: u64,

    /// Public base URL of the site, without a trailing slash.
    pub site_url: String,

    /// `scheme://host[:port]` of [`Self::site_url`], used for origin checks.
    pub site_origin: String,

    /// Account that receives every gift.
    pub owner_user_id: UserId,

    /// HS256 secret of the managed auth provider's access tokens.
    pub auth_jwt_secret: Secret,

    /// Accepted range for custom tip amounts.
    pub gift_bounds: AmountBounds,

    /// Whether USD tips can be started.
    pub gifts_enabled: bool,

    /// Whether coin packages can be bought.
    pub coin_purchases_enabled: bool,

    /// Whether signed-out visitors may tip.
    pub allow_anonymous_gifts: bool,

    /// Checkout rate limit window, in seconds.
    pub rate_limit_window_secs: u64,

    /// Checkout requests allowed per window per (user, ip).
    pub rate_limit_max_requests: u32,

    /// Whether a reverse proxy in front sets `X-Forwarded-For` /
    /// `X-Real-IP`. Off means the peer address is the client address.
    pub trust_proxy_headers: bool,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Per-request timeout for inbound HTTP, in seconds.
    pub request_timeout_secs: u64,

    /// Timeout for payment provider calls, in seconds.
    pub provider_timeout_secs: u64,

    /// Log output format.
    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let listen_addr: SocketAddr = env
            .get("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "LISTEN_ADDR",
                reason: e.to_string(),
            })?;

        let site_url = env.require("SITE_URL")?.trim_end_matches('/').to_string();
        let site_origin = reqwest::Url::parse(&site_url)
            .map_err(|e| ConfigError::Invalid {
                key: "SITE_URL",
                reason: e.to_string(),
            })?
            .origin()
            .ascii_serialization();
        if site_origin == "null" {
            return Err(ConfigError::Invalid {
                key: "SITE_URL",
                reason: "must be an http(s) URL".to_string(),
            });
        }

        let owner_user_id = env
            .require("OWNER_USER_ID")?
            .parse::<UserId>()
            .map_err(|e| ConfigError::Invalid {
                key: "OWNER_USER_ID",
                reason: e.to_string(),
            })?;

        let log_format = match env.get("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            database_url: env.get("DATABASE_URL"),
            database_max_connections: env.parse("DATABASE_MAX_CONNECTIONS", 10),
            database_min_connections: env.parse("DATABASE_MIN_CONNECTIONS", 2),
            database_connect_timeout_secs: env.parse("DATABASE_CONNECT_TIMEOUT_SECS", 5),
            stripe_secret_key: Secret::new(env.require("STRIPE_SECRET_KEY")?),
            stripe_webhook_secret: Secret::new(env.require("STRIPE_WEBHOOK_SECRET")?),
            stripe_api_base: env
                .get("STRIPE_API_BASE")
                .unwrap_or_else(|| crate::payments::stripe::DEFAULT_API_BASE.to_string()),
            webhook_tolerance_secs: env.parse("WEBHOOK_TOLERANCE_SECS", 300),
            site_url,
            site_origin,
            owner_user_id,
            auth_jwt_secret: Secret::new(env.require("AUTH_JWT_SECRET")?),
            gift_bounds: AmountBounds::new(
                env.parse("GIFT_MIN_CENTS", 100),
                env.parse("GIFT_MAX_CENTS", 50_000),
            ),
            gifts_enabled: env.parse_bool("GIFTS_ENABLED", true),
            coin_purchases_enabled: env.parse_bool("COIN_PURCHASES_ENABLED", true),
            allow_anonymous_gifts: env.parse_bool("ALLOW_ANONYMOUS_GIFTS", false),
            rate_limit_window_secs: env.parse("RATE_LIMIT_WINDOW_SECS", 60),
            rate_limit_max_requests: env.parse("RATE_LIMIT_MAX_REQUESTS", 20),
            trust_proxy_headers: env.parse_bool("TRUST_PROXY_HEADERS", false),
            event_bus_capacity: env.parse("EVENT_BUS_CAPACITY", 1_024),
            request_timeout_secs: env.parse("REQUEST_TIMEOUT_SECS", 30),
            provider_timeout_secs: env.parse("PROVIDER_TIMEOUT_SECS", 15),
            log_format,
        })
    }

    /// Checkout rate limit window.
    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    /// Parses a variable as `T`, returning `default` on missing or invalid
    /// values.
    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Parses a variable as a boolean. Accepts `"true"`, `"1"`, `"false"`,
    /// `"0"` (case-insensitive). Returns `default` otherwise.
    fn parse_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            _ => default,
        }
    }
}
