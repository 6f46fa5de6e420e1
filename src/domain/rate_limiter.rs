//! Process-local fixed-window rate limiter.
//!
//! [`RateLimiter`] counts requests per `(user, client ip)` pair inside a
//! fixed window. State lives in this process only: it resets on restart and
//! is not shared between instances, so it mitigates abuse but guarantees
//! nothing across a fleet.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::GatewayError;

/// Entries are pruned once the map grows past this size.
const PRUNE_THRESHOLD: usize = 10_000;

/// Composite identity a window is tracked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    user: String,
    ip: String,
}

impl RateLimitKey {
    /// Builds a key from a user label and a client address.
    #[must_use]
    pub fn new(user: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ip: ip.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window request counter keyed by [`RateLimitKey`].
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    windows: Mutex<HashMap<RateLimitKey, Window>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window`.
    #[must_use]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests: max_requests.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Records one request for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RateLimited`] with the whole seconds left in
    /// the window once the ceiling is reached.
    pub fn check(&self, key: &RateLimitKey) -> Result<(), GatewayError> {
        self.check_at(key, Instant::now())
            .map_err(|wait| GatewayError::RateLimited {
                retry_after_secs: ceil_secs(wait),
            })
    }

    /// Records one request for `key` at `now`, returning the remaining wait
    /// when the request is over the ceiling.
    ///
    /// # Errors
    ///
    /// Returns the time until the window resets if `key` is exhausted.
    pub fn check_at(&self, key: &RateLimitKey, now: Instant) -> Result<(), Duration> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| w.reset_at > now);
        }

        let window = windows.entry(key.clone()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });
        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = now + self.window;
        }
        if window.count >= self.max_requests {
            return Err(window.reset_at.saturating_duration_since(now));
        }
        window.count += 1;
        Ok(())
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}
