//! Type-safe event identifier.
//!
//! [`EventId`] is a newtype wrapper around the upstream's stable identity
//! for a marketplace occurrence (a transaction signature or an upstream
//! activity id), so it cannot be confused with item or wallet addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Globally unique identifier of a marketplace event.
///
/// Stable across redelivery: the same sale polled twice, or pushed by a
/// webhook after being polled, carries the same `EventId`. It is the
/// primary key of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wraps an upstream identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for an empty identifier, which never names an event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}
