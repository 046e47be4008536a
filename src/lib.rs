//! # sales-relay
//!
//! Exactly-once relay of NFT marketplace sales and listings to chat
//! webhooks.
//!
//! Each trigger (a poll of the marketplace activity feed, a webhook
//! delivery, or a top-sales request) processes one bounded batch to
//! completion. Every event is normalized, checked against the ledger,
//! enriched with item metadata and trait-based notify groups, recorded in
//! the ledger, and only then handed to a rate-limited dispatcher. Recording
//! before delivery means a crash can lose a notification but never
//! duplicate one.
//!
//! ## Architecture
//!
//! ```text
//! Triggers (HTTP: poll, webhook, top sales)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── RelayService / TopSalesAggregator (service/)
//!     │
//!     ├── Normalizer → Deduplicator → Enricher → RateLimitedDispatcher (pipeline/)
//!     │        │              │            │                │
//!     │   upstream feed    Ledger     metadata +       NotificationSink
//!     │   and parser      (ledger/)   TraitTable         (sink/)
//!     │   (upstream/)                 (upstream/, domain/)
//!     │
//!     └── PostgreSQL ledger (or in-memory / degraded window cache)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod service;
pub mod sink;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;
