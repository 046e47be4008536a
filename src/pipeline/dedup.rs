//! Deduplication policies.
//!
//! [`Deduplicator::Persistent`] asks the [`Ledger`] and is the canonical
//! mode. [`Deduplicator::RecentWindow`] is the degraded fallback used when
//! no ledger is reachable: it remembers only the ids on the latest feed
//! page, forgets everything on restart, and its check and mark are two
//! separate steps, so two overlapping invocations can both announce the
//! same event.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{Event, EventId, EventKind, LedgerEntry};
use crate::error::RelayError;
use crate::ledger::Ledger;

/// Outcome of the pre-enrichment check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not seen before; proceed.
    New,
    /// Same event id already processed.
    Duplicate,
    /// Different id, but the same seller re-listed the same item recently.
    SellerRepeat,
}

/// Bounded set of ids seen on the latest feed page.
#[derive(Debug, Default)]
pub struct RecentWindow {
    seen: Mutex<HashSet<EventId>>,
}

impl RecentWindow {
    fn with_seen<R>(&self, f: impl FnOnce(&mut HashSet<EventId>) -> R) -> R {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut seen)
    }

    /// Number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_seen(|s| s.len())
    }

    /// Returns `true` if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dedup oracle used by the batch pipeline.
#[derive(Debug)]
pub enum Deduplicator {
    /// Ledger-backed; survives restarts and overlapping invocations.
    Persistent {
        /// The seen-event ledger.
        ledger: Arc<dyn Ledger>,
        /// Prior listings per item inspected for seller repeats.
        seller_repeat_window: usize,
    },
    /// In-process window cache.
    RecentWindow(RecentWindow),
}

impl Deduplicator {
    /// Canonical ledger-backed deduplicator.
    #[must_use]
    pub fn persistent(ledger: Arc<dyn Ledger>, seller_repeat_window: usize) -> Self {
        Self::Persistent {
            ledger,
            seller_repeat_window,
        }
    }

    /// Degraded window-cache deduplicator.
    #[must_use]
    pub fn recent_window() -> Self {
        Self::RecentWindow(RecentWindow::default())
    }

    /// Returns `true` for the window-cache fallback.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::RecentWindow(_))
    }

    /// The ledger, if one backs this deduplicator.
    #[must_use]
    pub fn ledger(&self) -> Option<&Arc<dyn Ledger>> {
        match self {
            Self::Persistent { ledger, .. } => Some(ledger),
            Self::RecentWindow(_) => None,
        }
    }

    /// Shrinks the window cache to the ids on the current feed page.
    /// No-op in persistent mode.
    pub fn refresh_window<'a>(&self, page: impl IntoIterator<Item = &'a EventId>) {
        if let Self::RecentWindow(window) = self {
            let current: HashSet<&EventId> = page.into_iter().collect();
            window.with_seen(|seen| {
                let before = seen.len();
                seen.retain(|id| current.contains(id));
                tracing::debug!(evicted = before - seen.len(), kept = seen.len(), "window refreshed");
            });
        }
    }

    /// Decides whether `event` should proceed to enrichment.
    ///
    /// Seller-repeat suppression applies to listings in persistent mode
    /// only.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the ledger is unreachable.
    pub async fn check(&self, event: &Event) -> Result<Verdict, RelayError> {
        match self {
            Self::Persistent {
                ledger,
                seller_repeat_window,
            } => {
                if ledger.get(&event.event_id).await?.is_some() {
                    return Ok(Verdict::Duplicate);
                }
                if event.kind == EventKind::Listing && *seller_repeat_window > 0 {
                    let recent = ledger
                        .recent_for_item(&event.item_id, EventKind::Listing, *seller_repeat_window)
                        .await?;
                    let seller = &event.counterparties.seller;
                    if recent.iter().any(|e| &e.event.counterparties.seller == seller) {
                        return Ok(Verdict::SellerRepeat);
                    }
                }
                Ok(Verdict::New)
            }
            Self::RecentWindow(window) => {
                if window.with_seen(|seen| seen.contains(&event.event_id)) {
                    Ok(Verdict::Duplicate)
                } else {
                    Ok(Verdict::New)
                }
            }
        }
    }

    /// Marks `entry` processed. Returns `false` if another invocation got
    /// there first, in which case the caller must not dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the ledger is unreachable.
    pub async fn commit(&self, entry: &LedgerEntry) -> Result<bool, RelayError> {
        match self {
            Self::Persistent { ledger, .. } => ledger.put_if_absent(entry).await,
            Self::RecentWindow(window) => {
                Ok(window.with_seen(|seen| seen.insert(entry.event_id().clone())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::testing::{listing, sale};

    fn persistent() -> (Arc<MemoryLedger>, Deduplicator) {
        let ledger = Arc::new(MemoryLedger::new());
        let dedup = Deduplicator::persistent(Arc::<MemoryLedger>::clone(&ledger), 10);
        (ledger, dedup)
    }

    #[tokio::test]
    async fn persistent_new_then_duplicate() {
        let (_, dedup) = persistent();
        let event = sale("s1", "it1", "A", "B", 5_000_000_000);
        assert!(matches!(dedup.check(&event).await, Ok(Verdict::New)));
        assert!(matches!(dedup.commit(&LedgerEntry::new(event.clone(), None)).await, Ok(true)));
        assert!(matches!(dedup.check(&event).await, Ok(Verdict::Duplicate)));
        assert!(matches!(dedup.commit(&LedgerEntry::new(event, None)).await, Ok(false)));
    }

    #[tokio::test]
    async fn seller_repeat_within_window_is_suppressed() {
        let (ledger, dedup) = persistent();
        let _ = ledger.put_if_absent(&LedgerEntry::new(listing("l0", "X", "S", 1), None)).await;
        for i in 1..10 {
            let id = format!("l{i}");
            let _ = ledger
                .put_if_absent(&LedgerEntry::new(listing(&id, "X", &format!("other{i}"), 1), None))
                .await;
        }
        let by_s = listing("new-s", "X", "S", 2);
        let by_t = listing("new-t", "X", "T", 2);
        assert!(matches!(dedup.check(&by_s).await, Ok(Verdict::SellerRepeat)));
        assert!(matches!(dedup.check(&by_t).await, Ok(Verdict::New)));
    }

    #[tokio::test]
    async fn seller_repeat_outside_window_is_not_suppressed() {
        let (ledger, dedup) = persistent();
        let _ = ledger.put_if_absent(&LedgerEntry::new(listing("old", "X", "S", 1), None)).await;
        for i in 0..10 {
            let id = format!("l{i}");
            let _ = ledger
                .put_if_absent(&LedgerEntry::new(listing(&id, "X", &format!("other{i}"), 1), None))
                .await;
        }
        assert!(matches!(dedup.check(&listing("new-s", "X", "S", 2)).await, Ok(Verdict::New)));
    }

    #[tokio::test]
    async fn sales_are_never_seller_suppressed() {
        let (ledger, dedup) = persistent();
        let _ = ledger.put_if_absent(&LedgerEntry::new(listing("l0", "X", "S", 1), None)).await;
        assert!(matches!(dedup.check(&sale("s1", "X", "S", "B", 1)).await, Ok(Verdict::New)));
    }

    #[tokio::test]
    async fn window_forgets_ids_not_on_current_page() {
        let dedup = Deduplicator::recent_window();
        assert!(dedup.is_degraded());
        assert!(dedup.ledger().is_none());
        let a = sale("a", "it1", "A", "B", 1);
        let b = sale("b", "it2", "A", "B", 1);
        let _ = dedup.commit(&LedgerEntry::new(a.clone(), None)).await;
        let _ = dedup.commit(&LedgerEntry::new(b.clone(), None)).await;

        dedup.refresh_window([&b.event_id]);
        assert!(matches!(dedup.check(&a).await, Ok(Verdict::New)));
        assert!(matches!(dedup.check(&b).await, Ok(Verdict::Duplicate)));
        if let Deduplicator::RecentWindow(window) = &dedup {
            assert_eq!(window.len(), 1);
        }
    }
}
