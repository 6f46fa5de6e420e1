//! Amount validation and formatting for USD tips and coin quantities.

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Formats an amount in cents as dollars, e.g. `499` → `"$4.99"`.
#[must_use]
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

/// Inclusive bounds for a custom tip amount, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBounds {
    /// Smallest accepted amount.
    pub min_cents: i64,
    /// Largest accepted amount.
    pub max_cents: i64,
}

impl AmountBounds {
    /// Creates bounds, swapping the arguments if given in the wrong order.
    #[must_use]
    pub fn new(min_cents: i64, max_cents: i64) -> Self {
        if min_cents <= max_cents {
            Self {
                min_cents,
                max_cents,
            }
        } else {
            Self {
                min_cents: max_cents,
                max_cents: min_cents,
            }
        }
    }

    /// Validates an amount against the bounds.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AmountOutOfRange`] if `amount_cents` is
    /// outside `[min_cents, max_cents]`.
    pub fn check(&self, amount_cents: i64) -> Result<i64, GatewayError> {
        if (self.min_cents..=self.max_cents).contains(&amount_cents) {
            Ok(amount_cents)
        } else {
            Err(GatewayError::AmountOutOfRange {
                min_cents: self.min_cents,
                max_cents: self.max_cents,
            })
        }
    }
}

impl Default for AmountBounds {
    fn default() -> Self {
        Self::new(100, 50_000)
    }
}

/// Converts a client-supplied coin count into a whole number of coins.
///
/// Fractional values are truncated toward zero, never rounded.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the value is not finite or
/// is below one coin after truncation.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn whole_coins(raw: f64) -> Result<i64, GatewayError> {
    let truncated = raw.trunc();
    if !truncated.is_finite() || truncated < 1.0 || truncated >= i64::MAX as f64 {
        return Err(GatewayError::InvalidRequest(
            "coins must be a positive integer".to_string(),
        ));
    }
    Ok(truncated as i64)
}
