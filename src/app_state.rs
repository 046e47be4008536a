//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::{RelayService, TopSalesAggregator};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Batch pipeline for poll and webhook triggers.
    pub relay: Arc<RelayService>,
    /// Top-sales summary.
    pub aggregator: Arc<TopSalesAggregator>,
}
