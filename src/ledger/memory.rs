//! Process-lifetime ledger.
//!
//! Same contract as [`super::PostgresLedger`], including atomic
//! insert-if-absent, but state is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::Ledger;
use crate::domain::{EventId, EventKind, LedgerEntry};
use crate::error::RelayError;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<EventId, (u64, LedgerEntry)>,
    next_seq: u64,
}

/// In-memory [`Ledger`].
///
/// The insertion sequence breaks ties between entries committed within the
/// same clock tick, so recency queries are deterministic.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: RwLock<Inner>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Returns `true` if nothing has been committed.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get(&self, event_id: &EventId) -> Result<Option<LedgerEntry>, RelayError> {
        let inner = self.inner.read().await;
        Ok(inner.entries.get(event_id).map(|(_, e)| e.clone()))
    }

    async fn put_if_absent(&self, entry: &LedgerEntry) -> Result<bool, RelayError> {
        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(entry.event_id()) {
            return Ok(false);
        }
        let seq = inner.next_seq;
        inner.next_seq = seq.saturating_add(1);
        inner
            .entries
            .insert(entry.event_id().clone(), (seq, entry.clone()));
        Ok(true)
    }

    async fn top_sales(
        &self,
        collection_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, RelayError> {
        let inner = self.inner.read().await;
        let mut sales: Vec<&LedgerEntry> = inner
            .entries
            .values()
            .map(|(_, e)| e)
            .filter(|e| {
                e.event.kind == EventKind::Sale
                    && e.event.collection_id == collection_id
                    && e.processed_at >= since
            })
            .collect();
        sales.sort_by(|a, b| b.event.price.cmp(&a.event.price));
        Ok(sales.into_iter().take(limit).cloned().collect())
    }

    async fn recent_for_item(
        &self,
        item_id: &str,
        kind: EventKind,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, RelayError> {
        let inner = self.inner.read().await;
        let mut matching: Vec<&(u64, LedgerEntry)> = inner
            .entries
            .values()
            .filter(|(_, e)| e.event.item_id == item_id && e.event.kind == kind)
            .collect();
        matching.sort_by(|(sa, a), (sb, b)| {
            b.processed_at.cmp(&a.processed_at).then_with(|| sb.cmp(sa))
        });
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }
}
