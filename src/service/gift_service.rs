//! Gift service: coin-to-coin gifts from a member's wallet to the owner.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::money::whole_coins;
use crate::domain::{
    EventBus, GiftRecord, GiftTarget, IdempotencyKey, LedgerEvent, RecordKind, Unit, UserId,
};
use crate::error::GatewayError;
use crate::store::{CoinGift, GiftReceipt, LedgerStore, PostComment, WalletBalance};

/// Longest accepted gift style name.
const MAX_GIFT_TYPE_LEN: usize = 64;

/// A coin gift as requested by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct GiftRequest {
    /// Stream the gift is sent from.
    pub stream_id: Option<String>,
    /// Post the gift is attached to.
    pub post_id: Option<uuid::Uuid>,
    /// Gift style, e.g. `"rose"`.
    pub gift_type: String,
    /// Coins as sent by the client; truncated to a whole number.
    pub coins: f64,
    /// Caller-supplied retry guard.
    pub idempotency_key: String,
    /// Recipient asked for by the client. Always replaced by the owner.
    pub recipient_id: Option<UserId>,
}

/// Outcome of a coin gift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftSent {
    /// Receipt returned by the store.
    pub receipt: GiftReceipt,
    /// Sender's wallet after the gift.
    pub wallet: WalletBalance,
    /// Post the gift was attached to.
    pub post_id: Option<uuid::Uuid>,
}

/// Moves coins from members to the owner through the store's `send_gift`
/// RPC.
///
/// Deduplication is left entirely to the store: a repeated idempotency key
/// comes back as a replayed receipt and triggers no side effects.
#[derive(Debug, Clone)]
pub struct GiftService {
    store: Arc<dyn LedgerStore>,
    event_bus: EventBus,
    owner: UserId,
    enabled: bool,
}

impl GiftService {
    /// Creates a new `GiftService` paying every gift to `owner`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, event_bus: EventBus, owner: UserId, enabled: bool) -> Self {
        Self {
            store,
            event_bus,
            owner,
            enabled,
        }
    }

    /// Sends a coin gift from `sender` to the owner.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::FeatureDisabled`] if gifting is switched off.
    /// - [`GatewayError::InvalidRequest`] for bad coins, keys or gift types,
    ///   or when the owner tries to gift themselves.
    /// - [`GatewayError::InsufficientCoins`] if the wallet cannot cover it.
    pub async fn send_coin_gift(
        &self,
        sender: UserId,
        request: GiftRequest,
    ) -> Result<GiftSent, GatewayError> {
        if !self.enabled {
            return Err(GatewayError::FeatureDisabled("Gifts"));
        }
        let coins = whole_coins(request.coins)?;
        let idempotency_key = IdempotencyKey::parse(&request.idempotency_key)?;
        let gift_type = request.gift_type.trim();
        if gift_type.is_empty() || gift_type.chars().count() > MAX_GIFT_TYPE_LEN {
            return Err(GatewayError::InvalidRequest(format!(
                "gift_type must be 1 to {MAX_GIFT_TYPE_LEN} characters"
            )));
        }
        if sender == self.owner {
            return Err(GatewayError::InvalidRequest(
                "cannot send a gift to yourself".to_string(),
            ));
        }
        if let Some(requested) = request.recipient_id
            && requested != self.owner
        {
            tracing::warn!(%sender, %requested, "client recipient overridden with owner");
        }

        let stream_id = request
            .stream_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let target = match (request.post_id, &stream_id) {
            (Some(post), _) => GiftTarget::Post(post),
            (None, Some(_)) => GiftTarget::Live,
            (None, None) => GiftTarget::Wallet,
        };

        let gift = CoinGift {
            sender,
            recipient: self.owner,
            coins,
            gift_type: gift_type.to_string(),
            target,
            stream_id,
            idempotency_key,
        };
        let receipt = self.store.send_gift(&gift).await?;

        if receipt.replayed {
            tracing::info!(%sender, gift_id = %receipt.gift_id, "coin gift replayed");
        } else {
            tracing::info!(%sender, gift_id = %receipt.gift_id, coins, "coin gift sent");
            let _ = self.event_bus.publish(LedgerEvent::CoinGiftSent {
                gift_id: receipt.gift_id,
                gift_type: gift.gift_type.clone(),
                coins,
                target,
                timestamp: Utc::now(),
            });
            if let GiftTarget::Post(post_id) = target {
                self.record_post_gift(post_id, &gift).await;
            }
        }

        let wallet = self.store.get_wallet(sender).await?;
        Ok(GiftSent {
            receipt,
            wallet,
            post_id: target.post_id(),
        })
    }

    /// Best effort: a visible comment plus a mirrored paid gift record for
    /// the post. Failures are logged and the gift stands.
    async fn record_post_gift(&self, post_id: uuid::Uuid, gift: &CoinGift) {
        let comment = PostComment {
            post_id,
            author_id: gift.sender,
            body: format!("sent {} coins ({})", gift.coins, gift.gift_type),
        };
        if let Err(e) = self.store.insert_post_comment(&comment).await {
            tracing::warn!(%post_id, error = %e, "post gift comment failed");
        }

        let mirror = GiftRecord::pending(
            Some(gift.sender),
            RecordKind::CoinGift,
            Unit::Coins,
            gift.coins,
            format!("gift:{}", gift.gift_type),
            GiftTarget::Post(post_id),
        )
        .with_coins(gift.coins)
        .with_idempotency_key(gift.idempotency_key.clone())
        .settled_now();
        if let Err(e) = self.store.insert_record(&mirror).await {
            tracing::warn!(%post_id, error = %e, "post gift record failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::test_support::{FlakyStore, StoreOp};
    use crate::store::MemoryStore;

    fn member() -> UserId {
        UserId::from_uuid(uuid::Uuid::new_v4())
    }

    fn request(coins: f64, key: &str) -> GiftRequest {
        GiftRequest {
            stream_id: Some("main".to_string()),
            post_id: None,
            gift_type: "rose".to_string(),
            coins,
            idempotency_key: key.to_string(),
            recipient_id: None,
        }
    }

    async fn make_service() -> (GiftService, Arc<MemoryStore>, UserId) {
        let store = Arc::new(MemoryStore::new());
        let owner = member();
        let service = GiftService::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            EventBus::new(16),
            owner,
            true,
        );
        (service, store, owner)
    }

    #[tokio::test]
    async fn repeated_key_leaves_wallet_unchanged() {
        let (service, store, owner) = make_service().await;
        let sender = member();
        store.set_balance(sender, 100).await;

        let Ok(first) = service.send_coin_gift(sender, request(25.0, "k-1")).await else {
            panic!("first gift should succeed");
        };
        let Ok(second) = service.send_coin_gift(sender, request(25.0, "k-1")).await else {
            panic!("replay should succeed");
        };
        assert_eq!(first.wallet.coins, 75);
        assert_eq!(second.wallet.coins, 75);
        assert!(second.receipt.replayed);
        assert_eq!(store.get_wallet(owner).await.map(|w| w.coins).ok(), Some(25));
    }

    #[tokio::test]
    async fn fractional_coins_are_truncated() {
        let (service, store, _) = make_service().await;
        let sender = member();
        store.set_balance(sender, 10).await;
        let Ok(sent) = service.send_coin_gift(sender, request(3.9, "k-frac")).await else {
            panic!("gift should succeed");
        };
        assert_eq!(sent.receipt.coins, 3);

        let result = service.send_coin_gift(sender, request(0.7, "k-tiny")).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn recipient_is_always_the_owner() {
        let (service, store, owner) = make_service().await;
        let (sender, other) = (member(), member());
        store.set_balance(sender, 10).await;
        let mut req = request(5.0, "k-redirect");
        req.recipient_id = Some(other);
        let Ok(sent) = service.send_coin_gift(sender, req).await else {
            panic!("gift should succeed");
        };
        assert_eq!(sent.receipt.recipient, owner);
        assert_eq!(store.get_wallet(other).await.map(|w| w.coins).ok(), Some(0));
    }

    #[tokio::test]
    async fn missing_key_and_overdraft_are_rejected() {
        let (service, store, owner) = make_service().await;
        let sender = member();
        store.set_balance(sender, 2).await;
        let result = service.send_coin_gift(sender, request(1.0, "  ")).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
        let result = service.send_coin_gift(sender, request(5.0, "k-big")).await;
        assert!(matches!(result, Err(GatewayError::InsufficientCoins)));
        let result = service.send_coin_gift(owner, request(1.0, "k-self")).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn post_gift_adds_comment_and_mirror_once() {
        let (service, store, _) = make_service().await;
        let sender = member();
        store.set_balance(sender, 50).await;
        let post = uuid::Uuid::new_v4();
        let mut req = request(10.0, "k-post");
        req.post_id = Some(post);

        let Ok(sent) = service.send_coin_gift(sender, req.clone()).await else {
            panic!("gift should succeed");
        };
        assert_eq!(sent.post_id, Some(post));
        let _ = service.send_coin_gift(sender, req).await;

        let comments = store.post_comments().await;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments.first().map(|c| c.body.as_str()), Some("sent 10 coins (rose)"));
        let records = store.records().await;
        let [mirror] = records.as_slice() else {
            panic!("exactly one mirrored record expected");
        };
        assert!(mirror.is_paid());
        assert_eq!(mirror.target, GiftTarget::Post(post));
    }

    #[tokio::test]
    async fn failed_post_side_effects_keep_the_gift() {
        let store = Arc::new(MemoryStore::new());
        let flaky = Arc::new(FlakyStore::new(Arc::clone(&store)));
        flaky.fail(StoreOp::InsertPostComment);
        flaky.fail(StoreOp::InsertRecord);
        let owner = member();
        let service = GiftService::new(
            Arc::clone(&flaky) as Arc<dyn LedgerStore>,
            EventBus::new(16),
            owner,
            true,
        );
        let sender = member();
        store.set_balance(sender, 20).await;
        let post = uuid::Uuid::new_v4();
        let mut req = request(8.0, "k-post-down");
        req.post_id = Some(post);

        let Ok(sent) = service.send_coin_gift(sender, req).await else {
            panic!("gift should stand when its side effects fail");
        };
        assert_eq!(sent.wallet.coins, 12);
        assert_eq!(sent.post_id, Some(post));
        assert_eq!(store.get_wallet(owner).await.map(|w| w.coins).ok(), Some(8));
        assert!(store.post_comments().await.is_empty());
        assert!(store.records().await.is_empty());
    }
}
