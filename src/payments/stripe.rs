//! Stripe REST client for hosted checkout sessions.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{CheckoutSession, CheckoutSessionParams, PaymentProvider, ProviderSession};
use crate::error::GatewayError;

/// Default API origin.
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize)]
struct CreatedSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
}

/// Stripe checkout client authenticated with a secret key.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Builds a client with a rustls HTTP stack and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the HTTP client cannot be built.
    pub fn new(
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    /// Form fields for `POST /v1/checkout/sessions`.
    fn session_form(params: &CheckoutSessionParams) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), params.success_url.clone()),
            ("cancel_url".to_string(), params.cancel_url.clone()),
            (
                "client_reference_id".to_string(),
                params.metadata.record_id.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                params.currency.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                params.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                params.product_name.clone(),
            ),
        ];
        for (key, value) in params.metadata.to_pairs() {
            form.push((format!("metadata[{key}]"), value.clone()));
            form.push((format!("payment_intent_data[metadata][{key}]"), value));
        }
        form
    }

    async fn read_error(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or_else(|| status.to_string());
        GatewayError::Provider(message)
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, GatewayError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", params.metadata.idempotency_key.as_str())
            .form(&Self::session_form(params))
            .send()
            .await
            .map_err(|e| GatewayError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }
        let created: CreatedSession = response
            .json()
            .await
            .map_err(|e| GatewayError::Provider(format!("unexpected response: {e}")))?;
        let url = created
            .url
            .ok_or_else(|| GatewayError::Provider("session has no url".to_string()))?;
        Ok(CheckoutSession {
            id: created.id,
            url,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<ProviderSession, GatewayError> {
        if session_id.is_empty() || !session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(GatewayError::InvalidRequest("invalid session_id".to_string()));
        }
        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions/{session_id}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Provider(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::SessionNotFound(session_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::Provider(format!("unexpected response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IdempotencyKey, RecordId, RecordKind};
    use crate::payments::SessionMetadata;

    #[test]
    fn form_carries_metadata_on_session_and_intent() {
        let record_id = RecordId::new();
        let params = CheckoutSessionParams {
            product_name: "500 coins".to_string(),
            amount_cents: 499,
            currency: "usd",
            success_url: "https://club.example/wallet?checkout=success".to_string(),
            cancel_url: "https://club.example/wallet?checkout=canceled".to_string(),
            metadata: SessionMetadata {
                record_id,
                user_id: None,
                idempotency_key: IdempotencyKey::generate(),
                kind: RecordKind::CoinPurchase,
            },
        };
        let form = StripeClient::session_form(&params);
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("metadata[record_id]"), Some(record_id.to_string().as_str()));
        assert_eq!(
            get("payment_intent_data[metadata][record_id]"),
            Some(record_id.to_string().as_str())
        );
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("499"));
        assert_eq!(get("mode"), Some("payment"));
    }

    #[test]
    fn debug_redacts_secret() {
        let Ok(client) = StripeClient::new("sk_test_secret", DEFAULT_API_BASE, Duration::from_secs(5))
        else {
            return;
        };
        assert!(!format!("{client:?}").contains("sk_test_secret"));
    }

    #[tokio::test]
    async fn rejects_suspicious_session_ids_without_calling_out() {
        let Ok(client) = StripeClient::new("sk", "http://127.0.0.1:9", Duration::from_secs(1))
        else {
            return;
        };
        let result = client.retrieve_checkout_session("../../v1/charges").await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }
}
