//! Short-lived guard against webhook redelivery.
//!
//! Webhook providers retry aggressively; the same signature often arrives
//! several times within seconds. Remembering recent signatures avoids a
//! parser round-trip for each retry. The ledger still decides what is new.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// How long a webhook signature is remembered.
pub const REPLAY_TTL: Duration = Duration::from_secs(20);

/// Recently seen webhook signatures.
#[derive(Debug)]
pub struct ReplayGuard {
    ttl: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(REPLAY_TTL)
    }
}

impl ReplayGuard {
    /// Creates a guard remembering signatures for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Records `signature` and returns `true` if it was already seen within
    /// the TTL.
    pub fn is_replay(&self, signature: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        if seen.contains_key(signature) {
            return true;
        }
        seen.insert(signature.to_string(), now);
        false
    }

    /// Drops `signature` so the provider's next retry is processed.
    pub fn forget(&self, signature: &str) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(signature);
    }
}
