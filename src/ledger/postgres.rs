//! PostgreSQL implementation of the ledger.
//!
//! Uniqueness of `event_id` is enforced by the primary key; inserts use
//! `ON CONFLICT DO NOTHING` so concurrent pollers race safely on a single
//! statement.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::Ledger;
use crate::config::RelayConfig;
use crate::domain::{Counterparties, Event, EventId, EventKind, LedgerEntry, Price};
use crate::error::RelayError;

const SELECT_COLUMNS: &str = "event_id, kind, item_id, collection_id, occurred_at, price, \
     buyer, seller, marketplace_source, image_uri, item_name, processed_at";

/// A row of the `ledger_entries` table.
#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    event_id: String,
    kind: String,
    item_id: String,
    collection_id: String,
    occurred_at: i64,
    price: Decimal,
    buyer: Option<String>,
    seller: String,
    marketplace_source: String,
    image_uri: Option<String>,
    item_name: Option<String>,
    processed_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = RelayError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let kind = EventKind::from_ledger_str(&row.kind).ok_or_else(|| {
            RelayError::Internal(format!("unknown event kind {:?} in ledger", row.kind))
        })?;
        let price = Price::from_decimal(row.price)
            .map_err(|e| RelayError::Internal(format!("corrupt ledger price: {e}")))?;
        Ok(Self {
            event: Event {
                event_id: EventId::new(row.event_id),
                kind,
                item_id: row.item_id,
                collection_id: row.collection_id,
                timestamp: row.occurred_at,
                price,
                counterparties: Counterparties {
                    buyer: row.buyer,
                    seller: row.seller,
                },
                marketplace_source: row.marketplace_source,
                image_uri: row.image_uri,
            },
            item_name: row.item_name,
            processed_at: row.processed_at,
        })
    }
}

/// PostgreSQL-backed ledger using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a ledger over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the database settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the database is
    /// unreachable.
    pub async fn connect(config: &RelayConfig) -> Result<Self, RelayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), RelayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::Infrastructure(format!("migration failed: {e}")))
    }

    fn into_entries(rows: Vec<LedgerRow>) -> Result<Vec<LedgerEntry>, RelayError> {
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }
}

/// Clamps a result limit to the `BIGINT` range used by `LIMIT`.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl Ledger for PostgresLedger {
    async fn get(&self, event_id: &EventId) -> Result<Option<LedgerEntry>, RelayError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM ledger_entries WHERE event_id = $1");
        let row = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(event_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(LedgerEntry::try_from).transpose()
    }

    async fn put_if_absent(&self, entry: &LedgerEntry) -> Result<bool, RelayError> {
        let event = &entry.event;
        let result = sqlx::query(
            "INSERT INTO ledger_entries (event_id, kind, item_id, collection_id, occurred_at, \
             price, price_raw, price_decimals, buyer, seller, marketplace_source, image_uri, \
             item_name, processed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event.event_id.as_str())
        .bind(event.kind.as_str())
        .bind(&event.item_id)
        .bind(&event.collection_id)
        .bind(event.timestamp)
        .bind(event.price.amount())
        .bind(event.price.raw_amount().to_string())
        .bind(i32::try_from(event.price.decimals()).unwrap_or(i32::MAX))
        .bind(event.counterparties.buyer.as_deref())
        .bind(&event.counterparties.seller)
        .bind(&event.marketplace_source)
        .bind(event.image_uri.as_deref())
        .bind(entry.item_name.as_deref())
        .bind(entry.processed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn top_sales(
        &self,
        collection_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, RelayError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM ledger_entries \
             WHERE kind = 'sale' AND collection_id = $1 AND processed_at >= $2 \
             ORDER BY price DESC LIMIT $3"
        );
        let rows = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(collection_id)
            .bind(since)
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await?;
        Self::into_entries(rows)
    }

    async fn recent_for_item(
        &self,
        item_id: &str,
        kind: EventKind,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, RelayError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM ledger_entries \
             WHERE item_id = $1 AND kind = $2 \
             ORDER BY processed_at DESC LIMIT $3"
        );
        let rows = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(item_id)
            .bind(kind.as_str())
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await?;
        Self::into_entries(rows)
    }
}
