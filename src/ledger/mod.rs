//! Seen-event ledger: the dedup oracle and audit trail.
//!
//! The [`Ledger`] trait is the `findOne` / `insertOne` shaped contract the
//! pipeline relies on. [`PostgresLedger`] is the durable implementation;
//! [`MemoryLedger`] keeps the same contract for the lifetime of the process
//! and backs local runs and tests.
//!
//! `put_if_absent` must be atomic per event id: it is the only
//! serialization point between overlapping invocations.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EventId, EventKind, LedgerEntry};
use crate::error::RelayError;

pub use memory::MemoryLedger;
pub use postgres::PostgresLedger;

/// Persistent record of processed events.
#[async_trait]
pub trait Ledger: Send + Sync + std::fmt::Debug {
    /// Point lookup by event id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the store is unreachable.
    async fn get(&self, event_id: &EventId) -> Result<Option<LedgerEntry>, RelayError>;

    /// Inserts `entry` unless an entry with the same event id exists.
    /// Returns `true` if this call inserted it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the store is unreachable.
    async fn put_if_absent(&self, entry: &LedgerEntry) -> Result<bool, RelayError>;

    /// Sales of `collection_id` processed at or after `since`, highest
    /// price first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the store is unreachable.
    async fn top_sales(
        &self,
        collection_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, RelayError>;

    /// Most recent entries of `kind` for `item_id`, newest first, at most
    /// `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the store is unreachable.
    async fn recent_for_item(
        &self,
        item_id: &str,
        kind: EventKind,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, RelayError>;
}
