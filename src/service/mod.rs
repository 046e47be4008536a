//! Service layer: batch orchestration and the periodic summary.
//!
//! [`RelayService`] sequences the [`crate::pipeline`] stages for every
//! inbound batch; [`TopSalesAggregator`] reads the ledger on its own
//! cadence and shares the sales dispatcher.

pub mod aggregator;
pub mod relay_service;
pub mod replay;

pub use aggregator::{SummaryOutcome, TopSalesAggregator};
pub use relay_service::{BatchReport, Dispatchers, RelayService, Upstream};
