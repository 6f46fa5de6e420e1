//! PostgreSQL implementation of the ledger store.
//!
//! Ledger rows live in the `gifts` table; balances, gift transfers and
//! rollups are stored procedures owned by the managed backend and called
//! here by name.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::LedgerStore;
use super::models::{
    CancelOutcome, ChatMessage, CoinGift, CoinPackage, GiftReceipt, LiveSession, PostComment,
    RollupSummary, SettleOutcome, Settlement, WalletBalance,
};
use crate::domain::{
    GiftRecord, GiftTarget, IdempotencyKey, RecordId, RecordKind, RecordStatus, Unit, UserId,
};
use crate::error::GatewayError;

const GIFT_COLUMNS: &str = "id, user_id, kind, unit, amount, coins, source, target_kind, post_id, \
     anonymous, status, idempotency_key, checkout_session_id, payment_intent_id, \
     provider_event_id, created_at, paid_at";

/// Raw `gifts` row.
#[derive(Debug, sqlx::FromRow)]
struct GiftRow {
    id: Uuid,
    user_id: Option<Uuid>,
    kind: String,
    unit: String,
    amount: i64,
    coins: i64,
    source: String,
    target_kind: String,
    post_id: Option<Uuid>,
    anonymous: bool,
    status: String,
    idempotency_key: String,
    checkout_session_id: Option<String>,
    payment_intent_id: Option<String>,
    provider_event_id: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<GiftRow> for GiftRecord {
    type Error = GatewayError;

    fn try_from(row: GiftRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, value: &str| {
            GatewayError::PersistenceError(format!("gift {}: unexpected {what} {value:?}", row.id))
        };
        Ok(Self {
            id: RecordId::from_uuid(row.id),
            user_id: row.user_id.map(UserId::from_uuid),
            kind: RecordKind::parse(&row.kind).ok_or_else(|| corrupt("kind", &row.kind))?,
            unit: Unit::parse(&row.unit).ok_or_else(|| corrupt("unit", &row.unit))?,
            amount: row.amount,
            coins: row.coins,
            source: row.source.clone(),
            target: GiftTarget::from_parts(&row.target_kind, row.post_id)
                .ok_or_else(|| corrupt("target", &row.target_kind))?,
            anonymous: row.anonymous,
            status: RecordStatus::parse(&row.status)
                .ok_or_else(|| corrupt("status", &row.status))?,
            idempotency_key: IdempotencyKey::parse(&row.idempotency_key)
                .map_err(|_| corrupt("idempotency key", &row.idempotency_key))?,
            checkout_session_id: row.checkout_session_id.clone(),
            payment_intent_id: row.payment_intent_id.clone(),
            provider_event_id: row.provider_event_id.clone(),
            created_at: row.created_at,
            paid_at: row.paid_at,
        })
    }
}

/// PostgreSQL-backed ledger store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if the database is
    /// unreachable.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }

    async fn fetch_gift(&self, filter: &str, value: &str) -> Result<Option<GiftRecord>, GatewayError> {
        let sql = format!("SELECT {GIFT_COLUMNS} FROM gifts WHERE {filter} = $1");
        sqlx::query_as::<_, GiftRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(GiftRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn get_coin_package(&self, sku: &str) -> Result<Option<CoinPackage>, GatewayError> {
        let row = sqlx::query_as::<_, (String, i64, i64, bool)>(
            "SELECT sku, coins, price_cents, active FROM coin_packages WHERE sku = $1",
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(sku, coins, price_cents, active)| CoinPackage {
            sku,
            coins,
            price_cents,
            active,
        }))
    }

    async fn insert_record(&self, record: &GiftRecord) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO gifts (id, user_id, kind, unit, amount, coins, source, target_kind, \
             post_id, anonymous, status, idempotency_key, checkout_session_id, created_at, paid_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(*record.id.as_uuid())
        .bind(record.user_id.map(|u| *u.as_uuid()))
        .bind(record.kind.as_str())
        .bind(record.unit.as_str())
        .bind(record.amount)
        .bind(record.coins)
        .bind(&record.source)
        .bind(record.target.kind_str())
        .bind(record.target.post_id())
        .bind(record.anonymous)
        .bind(record.status.as_str())
        .bind(record.idempotency_key.as_str())
        .bind(record.checkout_session_id.as_deref())
        .bind(record.created_at)
        .bind(record.paid_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn attach_checkout_session(
        &self,
        id: RecordId,
        session_id: &str,
    ) -> Result<(), GatewayError> {
        let result = sqlx::query("UPDATE gifts SET checkout_session_id = $2 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::RecordNotFound(id));
        }
        Ok(())
    }

    async fn find_record(&self, id: RecordId) -> Result<Option<GiftRecord>, GatewayError> {
        let sql = format!("SELECT {GIFT_COLUMNS} FROM gifts WHERE id = $1");
        sqlx::query_as::<_, GiftRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(GiftRecord::try_from)
            .transpose()
    }

    async fn find_record_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GiftRecord>, GatewayError> {
        self.fetch_gift("checkout_session_id", session_id).await
    }

    async fn settle_record(
        &self,
        id: RecordId,
        settlement: &Settlement,
    ) -> Result<SettleOutcome, GatewayError> {
        let mut tx = self.pool.begin().await?;

        let locked = format!("SELECT {GIFT_COLUMNS} FROM gifts WHERE id = $1 FOR UPDATE");
        let current: GiftRecord = sqlx::query_as::<_, GiftRow>(&locked)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(GatewayError::RecordNotFound(id))?
            .try_into()?;

        match current.status {
            RecordStatus::Paid => return Ok(SettleOutcome::AlreadyPaid(current)),
            RecordStatus::Canceled => return Ok(SettleOutcome::Canceled(current)),
            RecordStatus::Pending => {}
        }

        let update = format!(
            "UPDATE gifts SET status = 'paid', paid_at = now(), provider_event_id = $2, \
             payment_intent_id = COALESCE($3, payment_intent_id), \
             checkout_session_id = COALESCE(checkout_session_id, $4) \
             WHERE id = $1 AND status = 'pending' RETURNING {GIFT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, GiftRow>(&update)
            .bind(*id.as_uuid())
            .bind(settlement.event_id.as_deref())
            .bind(settlement.payment_intent_id.as_deref())
            .bind(settlement.session_id.as_deref())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = updated else {
            tx.commit().await?;
            return Ok(SettleOutcome::AlreadyPaid(current));
        };
        let settled = GiftRecord::try_from(row)?;

        if settled.kind == RecordKind::CoinPurchase
            && let Some(user) = settled.user_id
        {
            sqlx::query("SELECT credit_coins($1, $2, $3)")
                .bind(*user.as_uuid())
                .bind(settled.coins)
                .bind(settled.idempotency_key.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(SettleOutcome::Applied(settled))
    }

    async fn cancel_record(&self, id: RecordId) -> Result<CancelOutcome, GatewayError> {
        let sql = format!(
            "UPDATE gifts SET status = 'canceled' WHERE id = $1 AND status = 'pending' \
             RETURNING {GIFT_COLUMNS}"
        );
        let canceled = sqlx::query_as::<_, GiftRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = canceled {
            return Ok(CancelOutcome::Canceled(row.try_into()?));
        }
        let current = self
            .find_record(id)
            .await?
            .ok_or(GatewayError::RecordNotFound(id))?;
        Ok(CancelOutcome::Unchanged(current))
    }

    async fn send_gift(&self, gift: &CoinGift) -> Result<GiftReceipt, GatewayError> {
        let row = sqlx::query_as::<_, (Uuid, bool, DateTime<Utc>)>(
            "SELECT gift_id, replayed, created_at FROM send_gift($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*gift.sender.as_uuid())
        .bind(*gift.recipient.as_uuid())
        .bind(gift.coins)
        .bind(&gift.gift_type)
        .bind(gift.target.kind_str())
        .bind(gift.target.post_id())
        .bind(gift.stream_id.as_deref())
        .bind(gift.idempotency_key.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let overdraft = e
                .as_database_error()
                .is_some_and(|db| db.message().contains("insufficient"));
            if overdraft {
                GatewayError::InsufficientCoins
            } else {
                GatewayError::from(e)
            }
        })?;

        let (gift_id, replayed, created_at) = row;
        Ok(GiftReceipt {
            gift_id: RecordId::from_uuid(gift_id),
            coins: gift.coins,
            gift_type: gift.gift_type.clone(),
            recipient: gift.recipient,
            replayed,
            created_at,
        })
    }

    async fn get_wallet(&self, user: UserId) -> Result<WalletBalance, GatewayError> {
        let row = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "SELECT coins, updated_at FROM get_wallet($1)",
        )
        .bind(*user.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let (coins, updated_at) = row.unwrap_or((0, Utc::now()));
        Ok(WalletBalance {
            user_id: user,
            coins,
            updated_at,
        })
    }

    async fn get_live_state(&self) -> Result<Option<LiveSession>, GatewayError> {
        let row = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
            "SELECT id, stream_id, started_at FROM get_live_state()",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, stream_id, started_at)| LiveSession {
            id,
            stream_id,
            started_at,
        }))
    }

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO live_chat_messages (live_session_id, body, is_system) VALUES ($1, $2, true)",
        )
        .bind(message.live_session_id)
        .bind(&message.body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_post_comment(&self, comment: &PostComment) -> Result<(), GatewayError> {
        sqlx::query("INSERT INTO post_comments (post_id, author_id, body) VALUES ($1, $2, $3)")
            .bind(comment.post_id)
            .bind(*comment.author_id.as_uuid())
            .bind(&comment.body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_display_name(&self, user: UserId) -> Result<Option<String>, GatewayError> {
        let name = sqlx::query_scalar::<_, Option<String>>(
            "SELECT display_name FROM profiles WHERE id = $1",
        )
        .bind(*user.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(name.flatten())
    }

    async fn run_monthly_rollup(&self, month: NaiveDate) -> Result<RollupSummary, GatewayError> {
        let (month, paid_records, usd_cents, coins) =
            sqlx::query_as::<_, (NaiveDate, i64, i64, i64)>(
                "SELECT month, paid_records, usd_cents, coins FROM run_monthly_rollup($1)",
            )
            .bind(month)
            .fetch_one(&self.pool)
            .await?;

        Ok(RollupSummary {
            month,
            paid_records,
            usd_cents,
            coins,
        })
    }
}
