//! In-memory ledger store for local development and tests.
//!
//! Honours the same contract as the Postgres backend: status-guarded
//! transitions and idempotency keys are checked under a single write lock,
//! which plays the role of the database transaction.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::LedgerStore;
use super::models::{
    CancelOutcome, ChatMessage, CoinGift, CoinPackage, GiftReceipt, LiveSession, PostComment,
    RollupSummary, SettleOutcome, Settlement, WalletBalance,
};
use crate::domain::{GiftRecord, RecordId, RecordKind, RecordStatus, Unit, UserId};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct State {
    packages: HashMap<String, CoinPackage>,
    records: HashMap<RecordId, GiftRecord>,
    wallets: HashMap<UserId, WalletBalance>,
    credited_keys: HashSet<String>,
    // Coin transactions, keyed by (sender, idempotency key).
    gifts: HashMap<(UserId, String), GiftReceipt>,
    live: Option<LiveSession>,
    chat: Vec<ChatMessage>,
    comments: Vec<PostComment>,
    profiles: HashMap<UserId, String>,
}

impl State {
    fn adjust_wallet(&mut self, user: UserId, delta: i64) -> i64 {
        let wallet = self.wallets.entry(user).or_insert_with(|| WalletBalance {
            user_id: user,
            coins: 0,
            updated_at: Utc::now(),
        });
        wallet.coins = wallet.coins.saturating_add(delta);
        wallet.updated_at = Utc::now();
        wallet.coins
    }
}

/// Ledger store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with the standard coin packages.
    pub async fn with_default_packages() -> Self {
        let store = Self::new();
        for (sku, coins, price_cents) in [
            ("coins_100", 100, 99),
            ("coins_500", 500, 499),
            ("coins_1200", 1_200, 999),
        ] {
            store
                .put_package(CoinPackage {
                    sku: sku.to_string(),
                    coins,
                    price_cents,
                    active: true,
                })
                .await;
        }
        store
    }

    /// Adds or replaces a coin package.
    pub async fn put_package(&self, package: CoinPackage) {
        self.state
            .write()
            .await
            .packages
            .insert(package.sku.clone(), package);
    }

    /// Overwrites a member's balance.
    pub async fn set_balance(&self, user: UserId, coins: i64) {
        let mut state = self.state.write().await;
        let current = state.wallets.get(&user).map_or(0, |w| w.coins);
        state.adjust_wallet(user, coins - current);
    }

    /// Sets or clears the live session on air.
    pub async fn set_live_session(&self, session: Option<LiveSession>) {
        self.state.write().await.live = session;
    }

    /// Sets a member's public display name.
    pub async fn set_display_name(&self, user: UserId, name: impl Into<String>) {
        self.state.write().await.profiles.insert(user, name.into());
    }

    /// Live chat messages posted so far.
    pub async fn chat_messages(&self) -> Vec<ChatMessage> {
        self.state.read().await.chat.clone()
    }

    /// Post comments added so far.
    pub async fn post_comments(&self) -> Vec<PostComment> {
        self.state.read().await.comments.clone()
    }

    /// All ledger records, oldest first.
    pub async fn records(&self) -> Vec<GiftRecord> {
        let mut records: Vec<_> = self.state.read().await.records.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_coin_package(&self, sku: &str) -> Result<Option<CoinPackage>, GatewayError> {
        Ok(self.state.read().await.packages.get(sku).cloned())
    }

    async fn insert_record(&self, record: &GiftRecord) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        if state.records.contains_key(&record.id) {
            return Err(GatewayError::PersistenceError(format!(
                "duplicate record id {}",
                record.id
            )));
        }
        state.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn attach_checkout_session(
        &self,
        id: RecordId,
        session_id: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or(GatewayError::RecordNotFound(id))?;
        record.checkout_session_id = Some(session_id.to_string());
        Ok(())
    }

    async fn find_record(&self, id: RecordId) -> Result<Option<GiftRecord>, GatewayError> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn find_record_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GiftRecord>, GatewayError> {
        Ok(self
            .state
            .read()
            .await
            .records
            .values()
            .find(|r| r.checkout_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn settle_record(
        &self,
        id: RecordId,
        settlement: &Settlement,
    ) -> Result<SettleOutcome, GatewayError> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or(GatewayError::RecordNotFound(id))?;

        match record.status {
            RecordStatus::Paid => return Ok(SettleOutcome::AlreadyPaid(record.clone())),
            RecordStatus::Canceled => return Ok(SettleOutcome::Canceled(record.clone())),
            RecordStatus::Pending => {}
        }

        record.status = RecordStatus::Paid;
        record.paid_at = Some(Utc::now());
        record.provider_event_id.clone_from(&settlement.event_id);
        if settlement.payment_intent_id.is_some() {
            record.payment_intent_id.clone_from(&settlement.payment_intent_id);
        }
        if record.checkout_session_id.is_none() {
            record.checkout_session_id.clone_from(&settlement.session_id);
        }
        let settled = record.clone();

        if settled.kind == RecordKind::CoinPurchase
            && let Some(user) = settled.user_id
            && state
                .credited_keys
                .insert(settled.idempotency_key.as_str().to_string())
        {
            state.adjust_wallet(user, settled.coins);
        }

        Ok(SettleOutcome::Applied(settled))
    }

    async fn cancel_record(&self, id: RecordId) -> Result<CancelOutcome, GatewayError> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or(GatewayError::RecordNotFound(id))?;
        if record.status != RecordStatus::Pending {
            return Ok(CancelOutcome::Unchanged(record.clone()));
        }
        record.status = RecordStatus::Canceled;
        Ok(CancelOutcome::Canceled(record.clone()))
    }

    async fn send_gift(&self, gift: &CoinGift) -> Result<GiftReceipt, GatewayError> {
        let mut state = self.state.write().await;
        let key = (gift.sender, gift.idempotency_key.as_str().to_string());
        if let Some(existing) = state.gifts.get(&key) {
            let mut replay = existing.clone();
            replay.replayed = true;
            return Ok(replay);
        }

        let balance = state.wallets.get(&gift.sender).map_or(0, |w| w.coins);
        if balance < gift.coins {
            return Err(GatewayError::InsufficientCoins);
        }
        state.adjust_wallet(gift.sender, -gift.coins);
        state.adjust_wallet(gift.recipient, gift.coins);

        let receipt = GiftReceipt {
            gift_id: RecordId::new(),
            coins: gift.coins,
            gift_type: gift.gift_type.clone(),
            recipient: gift.recipient,
            replayed: false,
            created_at: Utc::now(),
        };
        state.gifts.insert(key, receipt.clone());
        Ok(receipt)
    }

    async fn get_wallet(&self, user: UserId) -> Result<WalletBalance, GatewayError> {
        Ok(self
            .state
            .read()
            .await
            .wallets
            .get(&user)
            .cloned()
            .unwrap_or_else(|| WalletBalance {
                user_id: user,
                coins: 0,
                updated_at: Utc::now(),
            }))
    }

    async fn get_live_state(&self) -> Result<Option<LiveSession>, GatewayError> {
        Ok(self.state.read().await.live.clone())
    }

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), GatewayError> {
        self.state.write().await.chat.push(message.clone());
        Ok(())
    }

    async fn insert_post_comment(&self, comment: &PostComment) -> Result<(), GatewayError> {
        self.state.write().await.comments.push(comment.clone());
        Ok(())
    }

    async fn get_display_name(&self, user: UserId) -> Result<Option<String>, GatewayError> {
        Ok(self.state.read().await.profiles.get(&user).cloned())
    }

    async fn run_monthly_rollup(&self, month: NaiveDate) -> Result<RollupSummary, GatewayError> {
        let start = month.with_day(1).unwrap_or(month);
        let state = self.state.read().await;
        let mut summary = RollupSummary {
            month: start,
            paid_records: 0,
            usd_cents: 0,
            coins: 0,
        };
        let in_month = state.records.values().filter(|r| {
            r.paid_at.is_some_and(|at| {
                let day = at.date_naive();
                day.year() == start.year() && day.month() == start.month()
            })
        });
        for record in in_month {
            summary.paid_records += 1;
            match record.unit {
                Unit::Usd => summary.usd_cents += record.amount,
                Unit::Coins => summary.coins += record.amount,
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{GiftTarget, IdempotencyKey};

    fn user() -> UserId {
        UserId::from_uuid(uuid::Uuid::new_v4())
    }

    fn purchase(user: UserId) -> GiftRecord {
        GiftRecord::pending(
            Some(user),
            RecordKind::CoinPurchase,
            Unit::Usd,
            499,
            "checkout:coins_500",
            GiftTarget::Wallet,
        )
        .with_coins(500)
    }

    #[tokio::test]
    async fn settle_credits_wallet_once() {
        let store = MemoryStore::new();
        let buyer = user();
        let record = purchase(buyer);
        let Ok(()) = store.insert_record(&record).await else {
            panic!("insert failed");
        };

        let settlement = Settlement {
            event_id: Some("evt_1".to_string()),
            ..Settlement::default()
        };
        let Ok(SettleOutcome::Applied(paid)) = store.settle_record(record.id, &settlement).await
        else {
            panic!("first settle should apply");
        };
        assert!(paid.paid_at.is_some());
        assert_eq!(paid.provider_event_id.as_deref(), Some("evt_1"));

        let Ok(SettleOutcome::AlreadyPaid(_)) = store.settle_record(record.id, &settlement).await
        else {
            panic!("second settle should be a no-op");
        };
        let wallet = store.get_wallet(buyer).await.ok();
        assert_eq!(wallet.map(|w| w.coins), Some(500));
    }

    #[tokio::test]
    async fn cancel_never_overrides_paid() {
        let store = MemoryStore::new();
        let record = purchase(user());
        let _ = store.insert_record(&record).await;
        let _ = store.settle_record(record.id, &Settlement::default()).await;

        let Ok(CancelOutcome::Unchanged(after)) = store.cancel_record(record.id).await else {
            panic!("paid record must not be canceled");
        };
        assert_eq!(after.status, RecordStatus::Paid);
    }

    #[tokio::test]
    async fn canceled_record_cannot_be_settled() {
        let store = MemoryStore::new();
        let record = purchase(user());
        let _ = store.insert_record(&record).await;
        let _ = store.cancel_record(record.id).await;

        let Ok(SettleOutcome::Canceled(_)) =
            store.settle_record(record.id, &Settlement::default()).await
        else {
            panic!("canceled record must stay canceled");
        };
    }

    #[tokio::test]
    async fn send_gift_is_idempotent_per_key() {
        let store = MemoryStore::new();
        let (sender, owner) = (user(), user());
        store.set_balance(sender, 100).await;

        let Ok(key) = IdempotencyKey::parse("gift-abc") else {
            panic!("valid key");
        };
        let gift = CoinGift {
            sender,
            recipient: owner,
            coins: 30,
            gift_type: "rose".to_string(),
            target: GiftTarget::Live,
            stream_id: None,
            idempotency_key: key,
        };
        let Ok(first) = store.send_gift(&gift).await else {
            panic!("first gift failed");
        };
        let Ok(second) = store.send_gift(&gift).await else {
            panic!("replay failed");
        };
        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.gift_id, second.gift_id);

        assert_eq!(store.get_wallet(sender).await.map(|w| w.coins).ok(), Some(70));
        assert_eq!(store.get_wallet(owner).await.map(|w| w.coins).ok(), Some(30));
    }

    #[tokio::test]
    async fn send_gift_rejects_overdraft() {
        let store = MemoryStore::new();
        let Ok(key) = IdempotencyKey::parse("k") else {
            panic!("valid key");
        };
        let gift = CoinGift {
            sender: user(),
            recipient: user(),
            coins: 1,
            gift_type: "rose".to_string(),
            target: GiftTarget::Live,
            stream_id: None,
            idempotency_key: key,
        };
        assert!(matches!(
            store.send_gift(&gift).await,
            Err(GatewayError::InsufficientCoins)
        ));
    }

    #[tokio::test]
    async fn rollup_sums_paid_records_in_month() {
        let store = MemoryStore::new();
        let record = purchase(user());
        let _ = store.insert_record(&record).await;
        let _ = store.settle_record(record.id, &Settlement::default()).await;
        let pending = purchase(user());
        let _ = store.insert_record(&pending).await;

        let today = Utc::now().date_naive();
        let Ok(summary) = store.run_monthly_rollup(today).await else {
            panic!("rollup failed");
        };
        assert_eq!(summary.paid_records, 1);
        assert_eq!(summary.usd_cents, 499);
        assert_eq!(summary.month.day(), 1);
    }
}
