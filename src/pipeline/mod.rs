//! Per-event pipeline stages: normalize, dedup, enrich, dispatch.
//!
//! Each stage is usable on its own; [`crate::service::RelayService`]
//! sequences them per batch.

pub mod dedup;
pub mod dispatcher;
pub mod enricher;
pub mod normalizer;

pub use dedup::{Deduplicator, Verdict};
pub use dispatcher::RateLimitedDispatcher;
pub use enricher::{Enriched, Enricher, Enrichment, Presentation};
pub use normalizer::{NormalizationError, NormalizedBatch, Normalizer};
