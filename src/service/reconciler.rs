//! Reconciler: turns provider webhooks and client finalize calls into
//! ledger transitions.
//!
//! Both entry points funnel into [`Reconciler::settle`], which relies on
//! the store's status-guarded `pending → paid` update. Whichever caller
//! arrives first performs the transition and its side effects; the other
//! observes an already-paid record and does nothing.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::money::format_usd;
use crate::domain::{
    EventBus, GiftRecord, GiftTarget, LedgerEvent, RecordId, RecordKind, RecordStatus, UserId,
};
use crate::error::GatewayError;
use crate::payments::{PaymentProvider, ProviderEvent, ProviderSession, SignatureVerifier};
use crate::store::{CancelOutcome, ChatMessage, LedgerStore, SettleOutcome, Settlement};

/// Name shown for tippers without a public name.
const ANONYMOUS_NAME: &str = "Anonymous";

/// What a verified webhook did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A record moved `pending → paid`.
    Applied(RecordId),
    /// The event had already been applied.
    Duplicate(RecordId),
    /// A record moved `pending → canceled`.
    Canceled(RecordId),
    /// Acknowledged without any ledger change.
    Ignored,
}

/// Result of a client finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeResult {
    /// Record behind the session.
    pub record_id: RecordId,
    /// Status after the call.
    pub status: RecordStatus,
}

/// Applies provider outcomes to the ledger exactly once.
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: Arc<dyn LedgerStore>,
    provider: Arc<dyn PaymentProvider>,
    event_bus: EventBus,
    verifier: SignatureVerifier,
}

impl Reconciler {
    /// Creates a new `Reconciler`.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn PaymentProvider>,
        event_bus: EventBus,
        verifier: SignatureVerifier,
    ) -> Self {
        Self {
            store,
            provider,
            event_bus,
            verifier,
        }
    }

    /// Verifies and applies a raw webhook delivery.
    ///
    /// The body is not parsed until the signature has been checked.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidSignature`] if the signature is missing,
    ///   stale or wrong.
    /// - [`GatewayError::PersistenceError`] if the store fails, so the
    ///   provider retries the delivery.
    pub async fn handle_webhook(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, GatewayError> {
        self.verifier.verify(signature, body).map_err(|e| {
            tracing::warn!(error = %e, "webhook signature rejected");
            GatewayError::InvalidSignature(e.to_string())
        })?;

        let event = match ProviderEvent::parse(body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "verified webhook body is not a known event shape");
                return Ok(WebhookOutcome::Ignored);
            }
        };
        tracing::info!(
            event_id = event.event_id(),
            event_type = event.event_type(),
            "webhook received"
        );

        match event {
            ProviderEvent::CheckoutCompleted { event_id, session } => {
                self.on_completed(&event_id, session).await
            }
            ProviderEvent::CheckoutExpired { event_id, session } => {
                self.on_expired(&event_id, &session).await
            }
            ProviderEvent::Other { .. } => Ok(WebhookOutcome::Ignored),
        }
    }

    async fn on_completed(
        &self,
        event_id: &str,
        session: ProviderSession,
    ) -> Result<WebhookOutcome, GatewayError> {
        if !session.is_paid() {
            tracing::info!(
                event_id,
                session_id = %session.id,
                payment_status = %session.payment_status,
                "session completed but not paid yet"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let Some(record) = self.locate(&session).await? else {
            tracing::warn!(event_id, session_id = %session.id, "no ledger record for session");
            return Ok(WebhookOutcome::Ignored);
        };
        if record.was_settled_by(event_id) || record.is_paid() {
            tracing::info!(event_id, record_id = %record.id, "duplicate delivery ignored");
            return Ok(WebhookOutcome::Duplicate(record.id));
        }

        let settlement = Settlement {
            event_id: Some(event_id.to_string()),
            payment_intent_id: session.payment_intent,
            session_id: Some(session.id),
        };
        Ok(match self.settle(record.id, &settlement).await? {
            SettleOutcome::Applied(r) => WebhookOutcome::Applied(r.id),
            SettleOutcome::AlreadyPaid(r) => WebhookOutcome::Duplicate(r.id),
            SettleOutcome::Canceled(_) => WebhookOutcome::Ignored,
        })
    }

    async fn on_expired(
        &self,
        event_id: &str,
        session: &ProviderSession,
    ) -> Result<WebhookOutcome, GatewayError> {
        let Some(record) = self.locate(session).await? else {
            tracing::warn!(event_id, session_id = %session.id, "no ledger record for expired session");
            return Ok(WebhookOutcome::Ignored);
        };
        match self.store.cancel_record(record.id).await? {
            CancelOutcome::Canceled(r) => {
                tracing::info!(event_id, record_id = %r.id, "record canceled");
                let _ = self.event_bus.publish(LedgerEvent::GiftCanceled {
                    record_id: r.id,
                    target: r.target,
                    timestamp: Utc::now(),
                });
                Ok(WebhookOutcome::Canceled(r.id))
            }
            CancelOutcome::Unchanged(r) => {
                tracing::info!(
                    event_id,
                    record_id = %r.id,
                    status = r.status.as_str(),
                    "expiry ignored for terminal record"
                );
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Finalizes a checkout from the client's return page.
    ///
    /// Asks the provider for the session's current state and, if paid,
    /// runs the same settle routine as the webhook.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::SessionNotFound`] if no record references the
    ///   session.
    /// - [`GatewayError::Forbidden`] if the record belongs to another member.
    /// - [`GatewayError::InvalidRequest`] if the session metadata points at
    ///   a different record.
    /// - [`GatewayError::Provider`] if the provider cannot be reached.
    pub async fn finalize_session(
        &self,
        user: Option<UserId>,
        session_id: &str,
    ) -> Result<FinalizeResult, GatewayError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(GatewayError::InvalidRequest("session_id is required".to_string()));
        }
        let record = self
            .store
            .find_record_by_session(session_id)
            .await?
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))?;

        if let Some(owner) = record.user_id
            && user != Some(owner)
        {
            return Err(GatewayError::Forbidden(
                "session belongs to another member".to_string(),
            ));
        }
        if record.status.is_terminal() {
            return Ok(FinalizeResult {
                record_id: record.id,
                status: record.status,
            });
        }

        let session = self.provider.retrieve_checkout_session(session_id).await?;
        if session.record_id() != Some(record.id) {
            tracing::warn!(session_id, record_id = %record.id, "session metadata mismatch");
            return Err(GatewayError::InvalidRequest(
                "session does not match its ledger record".to_string(),
            ));
        }
        if !session.is_paid() {
            return Ok(FinalizeResult {
                record_id: record.id,
                status: RecordStatus::Pending,
            });
        }

        let settlement = Settlement {
            event_id: None,
            payment_intent_id: session.payment_intent,
            session_id: Some(session.id),
        };
        let outcome = self.settle(record.id, &settlement).await?;
        tracing::info!(session_id, record_id = %record.id, "session finalized by client");
        Ok(FinalizeResult {
            record_id: record.id,
            status: outcome.record().status,
        })
    }

    /// Runs the guarded `pending → paid` transition and, when this call
    /// performed it, the post-commit side effects.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the transition cannot be written.
    pub async fn settle(
        &self,
        id: RecordId,
        settlement: &Settlement,
    ) -> Result<SettleOutcome, GatewayError> {
        let outcome = self.store.settle_record(id, settlement).await?;
        match &outcome {
            SettleOutcome::Applied(record) => {
                tracing::info!(
                    record_id = %record.id,
                    event_id = ?settlement.event_id,
                    kind = record.kind.as_str(),
                    amount = record.amount,
                    "record paid"
                );
                let _ = self.event_bus.publish(LedgerEvent::paid(record));
                self.announce(record).await;
            }
            SettleOutcome::AlreadyPaid(record) => {
                tracing::debug!(record_id = %record.id, "record already paid");
            }
            SettleOutcome::Canceled(record) => {
                tracing::warn!(record_id = %record.id, "payment arrived for canceled record");
            }
        }
        Ok(outcome)
    }

    async fn locate(&self, session: &ProviderSession) -> Result<Option<GiftRecord>, GatewayError> {
        if let Some(id) = session.record_id()
            && let Some(record) = self.store.find_record(id).await?
        {
            return Ok(Some(record));
        }
        self.store.find_record_by_session(&session.id).await
    }

    /// Posts a chat system message for paid live tips. Failures are logged
    /// and never undo the payment.
    async fn announce(&self, record: &GiftRecord) {
        if record.kind != RecordKind::Tip || record.target != GiftTarget::Live {
            return;
        }
        if let Err(e) = self.try_announce(record).await {
            tracing::warn!(record_id = %record.id, error = %e, "chat announcement failed");
        }
    }

    async fn try_announce(&self, record: &GiftRecord) -> Result<(), GatewayError> {
        let Some(live) = self.store.get_live_state().await? else {
            tracing::debug!(record_id = %record.id, "no live session to announce in");
            return Ok(());
        };
        let name = match record.user_id {
            Some(user) if !record.anonymous => self
                .store
                .get_display_name(user)
                .await
                .ok()
                .flatten()
                .filter(|n| !n.trim().is_empty()),
            _ => None,
        }
        .unwrap_or_else(|| ANONYMOUS_NAME.to_string());

        let message = ChatMessage {
            live_session_id: live.id,
            body: format!("{name} tipped {}", format_usd(record.amount)),
        };
        self.store.insert_chat_message(&message).await?;
        let _ = self.event_bus.publish(LedgerEvent::ChatAnnouncement {
            live_session_id: message.live_session_id,
            body: message.body,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
