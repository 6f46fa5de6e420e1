//! Client-side checkout finalizer.
//!
//! After the provider redirects back with `?session_id=...`, the return page
//! asks the gateway to settle the session in case the webhook is late.
//! [`FinalizeClient::finalize`] runs that request on a detached task and
//! publishes progress through a [`tokio::sync::watch`] channel: dropping
//! the receiver (the page unmounting) stops updates but never aborts a
//! request already in flight.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;

use crate::domain::RecordStatus;
use crate::error::ErrorResponse;

/// Progress of a finalize attempt as shown to the member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeStatus {
    /// Request in flight.
    Finalizing,
    /// The record is paid.
    Success,
    /// The provider has not confirmed payment yet; the webhook will finish
    /// the job.
    Pending,
    /// The request failed or the checkout was canceled.
    Error(String),
}

/// Errors from a single finalize request.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The gateway answered with an error body.
    #[error("{message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Error message from the gateway.
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct FinalizeBody {
    status: RecordStatus,
}

/// Calls `POST /api/v1/checkout/finalize` on behalf of the return page.
#[derive(Debug, Clone)]
pub struct FinalizeClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
    attempts: u32,
    retry_delay: Duration,
}

impl FinalizeClient {
    /// Creates a client for the gateway at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/api/v1/checkout/finalize",
                base_url.trim_end_matches('/')
            ),
            access_token: None,
            attempts: 3,
            retry_delay: Duration::from_secs(2),
        })
    }

    /// Sends the member's access token with each request.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Polls up to `attempts` times while the session is still pending.
    #[must_use]
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Sends one finalize request and returns the record status.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failure or an error response.
    pub async fn finalize_once(&self, session_id: &str) -> Result<RecordStatus, ClientError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "session_id": session_id }));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map_or_else(|_| status.to_string(), |body| body.error);
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<FinalizeBody>().await?.status)
    }

    /// Starts finalizing `session_id` on a detached task.
    ///
    /// Must be called from within a Tokio runtime. Calling it more than once
    /// for the same session is harmless: the server settles each record at
    /// most once.
    #[must_use]
    pub fn finalize(&self, session_id: impl Into<String>) -> watch::Receiver<FinalizeStatus> {
        let (tx, rx) = watch::channel(FinalizeStatus::Finalizing);
        let client = self.clone();
        let session_id = session_id.into();
        tokio::spawn(async move {
            let status = client.poll(&session_id, &tx).await;
            tracing::debug!(session_id = %session_id, ?status, "finalize finished");
            let _ = tx.send(status);
        });
        rx
    }

    async fn poll(&self, session_id: &str, tx: &watch::Sender<FinalizeStatus>) -> FinalizeStatus {
        for attempt in 1..=self.attempts {
            match self.finalize_once(session_id).await {
                Ok(RecordStatus::Paid) => return FinalizeStatus::Success,
                Ok(RecordStatus::Canceled) => {
                    return FinalizeStatus::Error("Checkout was canceled".to_string());
                }
                Ok(RecordStatus::Pending) => {}
                Err(e) => return FinalizeStatus::Error(e.to_string()),
            }
            // Unwatched: let the finished request stand, skip further polls.
            if attempt == self.attempts || tx.is_closed() {
                break;
            }
            tokio::time::sleep(self.retry_delay).await;
        }
        FinalizeStatus::Pending
    }
}

/// Extracts the `session_id` query parameter from a return URL, absolute
/// or relative.
#[must_use]
pub fn session_id_from_return_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url)
        .or_else(|_| reqwest::Url::parse("http://localhost/").and_then(|base| base.join(url)))
        .ok()?;
    parsed
        .query_pairs()
        .find(|(k, v)| k == "session_id" && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}
