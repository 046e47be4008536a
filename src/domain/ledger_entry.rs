//! Persisted projection of a processed event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Event, EventId};

/// Ledger row: the event as it was processed, plus when.
///
/// Created exactly once, before dispatch is attempted, and never updated
/// or deleted afterwards. The ledger owns it exclusively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The processed event, with enrichment-filled image.
    pub event: Event,
    /// Display name resolved during enrichment, reused by the top-sales
    /// summary.
    pub item_name: Option<String>,
    /// When the relay committed this entry.
    pub processed_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(event: Event, item_name: Option<String>) -> Self {
        Self {
            event,
            item_name,
            processed_at: Utc::now(),
        }
    }

    /// Returns the dedup key.
    #[must_use]
    pub fn event_id(&self) -> &EventId {
        &self.event.event_id
    }
}
