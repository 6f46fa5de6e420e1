//! Provider webhook events.
//!
//! Only the two checkout session events drive ledger transitions; every
//! other type is kept as [`ProviderEvent::Other`] so it can be acknowledged
//! and ignored as the provider's catalog grows.

use serde::Deserialize;

use super::ProviderSession;
use crate::error::GatewayError;

/// A checkout session finished and may be paid.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// A checkout session timed out unpaid.
pub const CHECKOUT_EXPIRED: &str = "checkout.session.expired";

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

/// A verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// `checkout.session.completed`.
    CheckoutCompleted {
        /// Provider event id.
        event_id: String,
        /// Session the event is about.
        session: ProviderSession,
    },
    /// `checkout.session.expired`.
    CheckoutExpired {
        /// Provider event id.
        event_id: String,
        /// Session the event is about.
        session: ProviderSession,
    },
    /// Any other event type.
    Other {
        /// Provider event id.
        event_id: String,
        /// Provider event type.
        event_type: String,
    },
}

impl ProviderEvent {
    /// Parses a raw webhook body. Call only after signature verification.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the body is not a valid
    /// event envelope, or a checkout event carries no session object.
    pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid event payload: {e}")))?;

        let session = |data: Option<EnvelopeData>| -> Result<ProviderSession, GatewayError> {
            let object = data
                .map(|d| d.object)
                .ok_or_else(|| GatewayError::InvalidRequest("event has no data".to_string()))?;
            serde_json::from_value(object).map_err(|e| {
                GatewayError::InvalidRequest(format!("invalid checkout session: {e}"))
            })
        };

        Ok(match envelope.event_type.as_str() {
            CHECKOUT_COMPLETED => Self::CheckoutCompleted {
                session: session(envelope.data)?,
                event_id: envelope.id,
            },
            CHECKOUT_EXPIRED => Self::CheckoutExpired {
                session: session(envelope.data)?,
                event_id: envelope.id,
            },
            _ => Self::Other {
                event_id: envelope.id,
                event_type: envelope.event_type.clone(),
            },
        })
    }

    /// Provider event id.
    #[must_use]
    pub fn event_id(&self) -> &str {
        match self {
            Self::CheckoutCompleted { event_id, .. }
            | Self::CheckoutExpired { event_id, .. }
            | Self::Other { event_id, .. } => event_id,
        }
    }

    /// Provider event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::CheckoutCompleted { .. } => CHECKOUT_COMPLETED,
            Self::CheckoutExpired { .. } => CHECKOUT_EXPIRED,
            Self::Other { event_type, .. } => event_type,
        }
    }
}
