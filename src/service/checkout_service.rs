//! Checkout service: validates purchase and tip requests, writes the
//! pending ledger record and opens the provider's hosted checkout.

use std::sync::Arc;

use crate::domain::{
    AmountBounds, GiftRecord, GiftTarget, IdempotencyKey, RecordId, RecordKind, ReturnPath, Unit,
    UserId,
};
use crate::error::GatewayError;
use crate::payments::{CheckoutSessionParams, PaymentProvider, SessionMetadata};
use crate::store::{CancelOutcome, LedgerStore};

/// Placeholder the provider substitutes with the real session id.
const SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Settings that shape which checkouts may be opened.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Public base URL redirects are built from.
    pub site_url: String,
    /// Accepted tip range.
    pub bounds: AmountBounds,
    /// Whether tips can be started.
    pub gifts_enabled: bool,
    /// Whether coin packages can be bought.
    pub coin_purchases_enabled: bool,
    /// Whether signed-out visitors may tip.
    pub allow_anonymous_gifts: bool,
}

/// What the member is paying for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOrder {
    /// A coin package by SKU.
    CoinPackage {
        /// Package SKU.
        sku: String,
    },
    /// A USD tip.
    Tip {
        /// Amount in cents.
        amount_cents: i64,
        /// Post the tip is attached to; `None` tips the live stream.
        post_id: Option<uuid::Uuid>,
        /// Hide the tipper's name.
        anonymous: bool,
    },
}

/// An opened checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutStarted {
    /// Pending ledger record backing the checkout.
    pub record_id: RecordId,
    /// Hosted page to redirect to.
    pub url: String,
    /// Provider session id.
    pub session_id: String,
    /// Key that guards the eventual credit.
    pub idempotency_key: IdempotencyKey,
}

/// Opens provider checkouts backed by pending ledger records.
///
/// The pending record is always written before the provider is contacted,
/// so every session the provider knows about has a ledger row to land on.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    store: Arc<dyn LedgerStore>,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    /// Creates a new `CheckoutService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn PaymentProvider>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            provider,
            settings,
        }
    }

    /// Returns the checkout settings.
    #[must_use]
    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Validates `order`, records it as pending and opens a hosted checkout.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::FeatureDisabled`] if the flow is switched off.
    /// - [`GatewayError::Unauthorized`] if the order needs a signed-in user.
    /// - [`GatewayError::UnknownPackage`] for unknown or inactive SKUs.
    /// - [`GatewayError::AmountOutOfRange`] for tips outside the bounds.
    /// - [`GatewayError::Provider`] if the provider rejects the session; the
    ///   pending record is canceled first.
    pub async fn start_checkout(
        &self,
        user: Option<UserId>,
        order: CheckoutOrder,
        return_path: &ReturnPath,
    ) -> Result<CheckoutStarted, GatewayError> {
        let (record, product_name) = self.build_record(user, order).await?;

        self.store.insert_record(&record).await?;
        tracing::info!(
            record_id = %record.id,
            kind = record.kind.as_str(),
            amount = record.amount,
            "pending record created"
        );

        let params = CheckoutSessionParams {
            product_name,
            amount_cents: record.amount,
            currency: "usd",
            success_url: return_path.to_url(
                &self.settings.site_url,
                &format!("checkout=success&session_id={SESSION_PLACEHOLDER}"),
            ),
            cancel_url: return_path.to_url(&self.settings.site_url, "checkout=canceled"),
            metadata: SessionMetadata {
                record_id: record.id,
                user_id: record.user_id,
                idempotency_key: record.idempotency_key.clone(),
                kind: record.kind,
            },
        };

        let session = match self.provider.create_checkout_session(&params).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(
                    record_id = %record.id,
                    provider = self.provider.name(),
                    error = %e,
                    "checkout session creation failed"
                );
                self.cancel_orphan(record.id).await;
                return Err(e);
            }
        };

        self.store
            .attach_checkout_session(record.id, &session.id)
            .await?;
        tracing::info!(record_id = %record.id, session_id = %session.id, "checkout session opened");

        Ok(CheckoutStarted {
            record_id: record.id,
            url: session.url,
            session_id: session.id,
            idempotency_key: record.idempotency_key,
        })
    }

    async fn build_record(
        &self,
        user: Option<UserId>,
        order: CheckoutOrder,
    ) -> Result<(GiftRecord, String), GatewayError> {
        match order {
            CheckoutOrder::CoinPackage { sku } => {
                if !self.settings.coin_purchases_enabled {
                    return Err(GatewayError::FeatureDisabled("Coin purchases"));
                }
                let user = user.ok_or(GatewayError::Unauthorized)?;
                let package = self
                    .store
                    .get_coin_package(sku.trim())
                    .await?
                    .filter(|p| p.active)
                    .ok_or(GatewayError::UnknownPackage(sku))?;
                let record = GiftRecord::pending(
                    Some(user),
                    RecordKind::CoinPurchase,
                    Unit::Usd,
                    package.price_cents,
                    format!("checkout:{}", package.sku),
                    GiftTarget::Wallet,
                )
                .with_coins(package.coins);
                Ok((record, format!("{} coins", package.coins)))
            }
            CheckoutOrder::Tip {
                amount_cents,
                post_id,
                anonymous,
            } => {
                if !self.settings.gifts_enabled {
                    return Err(GatewayError::FeatureDisabled("Gifts"));
                }
                if user.is_none() && !self.settings.allow_anonymous_gifts {
                    return Err(GatewayError::Unauthorized);
                }
                let amount = self.settings.bounds.check(amount_cents)?;
                let target = post_id.map_or(GiftTarget::Live, GiftTarget::Post);
                let record = GiftRecord::pending(
                    user,
                    RecordKind::Tip,
                    Unit::Usd,
                    amount,
                    format!("tip:{}", target.kind_str()),
                    target,
                )
                .with_anonymous(anonymous || user.is_none());
                Ok((record, "Tip".to_string()))
            }
        }
    }

    async fn cancel_orphan(&self, id: RecordId) {
        match self.store.cancel_record(id).await {
            Ok(CancelOutcome::Canceled(_)) => {
                tracing::info!(record_id = %id, "orphaned pending record canceled");
            }
            Ok(CancelOutcome::Unchanged(record)) => {
                tracing::warn!(record_id = %id, status = record.status.as_str(), "orphaned record already terminal");
            }
            Err(e) => {
                tracing::warn!(record_id = %id, error = %e, "failed to cancel orphaned record");
            }
        }
    }
}
