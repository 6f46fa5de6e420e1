//! Service layer: business logic orchestration.
//!
//! [`CheckoutService`] opens provider checkouts against pending ledger
//! records, [`Reconciler`] settles them from webhooks or client finalize
//! calls, and [`GiftService`] moves coins between wallets. All three talk
//! to the store through [`crate::store::LedgerStore`] and emit events
//! through the [`crate::domain::EventBus`].

pub mod checkout_service;
pub mod gift_service;
pub mod reconciler;

pub use checkout_service::{CheckoutOrder, CheckoutService, CheckoutSettings, CheckoutStarted};
pub use gift_service::{GiftRequest, GiftSent, GiftService};
pub use reconciler::{FinalizeResult, Reconciler, WebhookOutcome};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, PoisonError};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::Mutex;

    use crate::domain::{GiftRecord, RecordId, RecordStatus, UserId};
    use crate::error::GatewayError;
    use crate::payments::{CheckoutSession, CheckoutSessionParams, PaymentProvider, ProviderSession};
    use crate::store::{
        CancelOutcome, ChatMessage, CoinGift, CoinPackage, GiftReceipt, LedgerStore, LiveSession,
        MemoryStore, PostComment, RollupSummary, SettleOutcome, Settlement, WalletBalance,
    };

    /// Store operations [`FlakyStore`] can be told to fail.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) enum StoreOp {
        InsertRecord,
        SettleRecord,
        InsertChatMessage,
        InsertPostComment,
    }

    /// Delegates to a [`MemoryStore`] but fails selected operations with a
    /// persistence error.
    #[derive(Debug)]
    pub(crate) struct FlakyStore {
        inner: Arc<MemoryStore>,
        failing: std::sync::Mutex<HashSet<StoreOp>>,
    }

    impl FlakyStore {
        pub(crate) fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                failing: std::sync::Mutex::new(HashSet::new()),
            }
        }

        pub(crate) fn fail(&self, op: StoreOp) {
            self.failing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(op);
        }

        fn check(&self, op: StoreOp) -> Result<(), GatewayError> {
            if self
                .failing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&op)
            {
                return Err(GatewayError::PersistenceError(format!("{op:?} unavailable")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LedgerStore for FlakyStore {
        async fn get_coin_package(&self, sku: &str) -> Result<Option<CoinPackage>, GatewayError> {
            self.inner.get_coin_package(sku).await
        }

        async fn insert_record(&self, record: &GiftRecord) -> Result<(), GatewayError> {
            self.check(StoreOp::InsertRecord)?;
            self.inner.insert_record(record).await
        }

        async fn attach_checkout_session(
            &self,
            id: RecordId,
            session_id: &str,
        ) -> Result<(), GatewayError> {
            self.inner.attach_checkout_session(id, session_id).await
        }

        async fn find_record(&self, id: RecordId) -> Result<Option<GiftRecord>, GatewayError> {
            self.inner.find_record(id).await
        }

        async fn find_record_by_session(
            &self,
            session_id: &str,
        ) -> Result<Option<GiftRecord>, GatewayError> {
            self.inner.find_record_by_session(session_id).await
        }

        async fn settle_record(
            &self,
            id: RecordId,
            settlement: &Settlement,
        ) -> Result<SettleOutcome, GatewayError> {
            self.check(StoreOp::SettleRecord)?;
            self.inner.settle_record(id, settlement).await
        }

        async fn cancel_record(&self, id: RecordId) -> Result<CancelOutcome, GatewayError> {
            self.inner.cancel_record(id).await
        }

        async fn send_gift(&self, gift: &CoinGift) -> Result<GiftReceipt, GatewayError> {
            self.inner.send_gift(gift).await
        }

        async fn get_wallet(&self, user: UserId) -> Result<WalletBalance, GatewayError> {
            self.inner.get_wallet(user).await
        }

        async fn get_live_state(&self) -> Result<Option<LiveSession>, GatewayError> {
            self.inner.get_live_state().await
        }

        async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), GatewayError> {
            self.check(StoreOp::InsertChatMessage)?;
            self.inner.insert_chat_message(message).await
        }

        async fn insert_post_comment(&self, comment: &PostComment) -> Result<(), GatewayError> {
            self.check(StoreOp::InsertPostComment)?;
            self.inner.insert_post_comment(comment).await
        }

        async fn get_display_name(&self, user: UserId) -> Result<Option<String>, GatewayError> {
            self.inner.get_display_name(user).await
        }

        async fn run_monthly_rollup(&self, month: NaiveDate) -> Result<RollupSummary, GatewayError> {
            self.inner.run_monthly_rollup(month).await
        }
    }

    /// A created session together with the record status seen at call time.
    #[derive(Debug, Clone)]
    pub(crate) struct CreatedCall {
        pub(crate) params: CheckoutSessionParams,
        pub(crate) record_status: Option<RecordStatus>,
    }

    #[derive(Debug, Default)]
    struct MockState {
        fail_create: bool,
        sessions: HashMap<String, ProviderSession>,
        calls: Vec<CreatedCall>,
    }

    /// In-process provider that records every call.
    #[derive(Debug)]
    pub(crate) struct MockProvider {
        store: Arc<dyn LedgerStore>,
        state: Mutex<MockState>,
    }

    impl MockProvider {
        pub(crate) fn new(store: Arc<dyn LedgerStore>) -> Self {
            Self {
                store,
                state: Mutex::new(MockState::default()),
            }
        }

        pub(crate) async fn fail_creates(&self) {
            self.state.lock().await.fail_create = true;
        }

        pub(crate) async fn mark_paid(&self, session_id: &str) -> Option<ProviderSession> {
            let mut state = self.state.lock().await;
            let session = state.sessions.get_mut(session_id)?;
            session.payment_status = "paid".to_string();
            session.payment_intent = Some(format!("pi_{session_id}"));
            Some(session.clone())
        }

        pub(crate) async fn calls(&self) -> Vec<CreatedCall> {
            self.state.lock().await.calls.clone()
        }
    }

    #[async_trait]
    impl PaymentProvider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn create_checkout_session(
            &self,
            params: &CheckoutSessionParams,
        ) -> Result<CheckoutSession, GatewayError> {
            let record_status = self
                .store
                .find_record(params.metadata.record_id)
                .await?
                .map(|r| r.status);
            let mut state = self.state.lock().await;
            state.calls.push(CreatedCall {
                params: params.clone(),
                record_status,
            });
            if state.fail_create {
                return Err(GatewayError::Provider("card network down".to_string()));
            }
            let id = format!("cs_test_{}", state.calls.len());
            let metadata = params
                .metadata
                .to_pairs()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            state.sessions.insert(
                id.clone(),
                ProviderSession {
                    id: id.clone(),
                    payment_status: "unpaid".to_string(),
                    payment_intent: None,
                    metadata,
                },
            );
            Ok(CheckoutSession {
                url: format!("https://checkout.test/{id}"),
                id,
            })
        }

        async fn retrieve_checkout_session(
            &self,
            session_id: &str,
        ) -> Result<ProviderSession, GatewayError> {
            self.state
                .lock()
                .await
                .sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))
        }
    }
}
