//! Batch and summary response bodies.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::service::{BatchReport, SummaryOutcome};

/// Query parameters of the poll endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct FeedQuery {
    /// When `true`, the request body is used as the activity page instead
    /// of fetching it upstream.
    #[serde(default)]
    pub test: bool,
}

/// Outcome counts of one batch.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchReportResponse {
    /// Always `"ok"` on a 200.
    pub status: String,
    /// Raw records received.
    pub received: usize,
    /// Out-of-scope records.
    pub filtered: usize,
    /// Already-processed events.
    pub duplicates: usize,
    /// Seller-repeat listings.
    pub suppressed: usize,
    /// Listings without metadata.
    pub skipped: usize,
    /// Notifications delivered.
    pub dispatched: usize,
    /// Notifications rejected by the sink.
    pub failed: usize,
    /// Events left for the next run.
    pub abandoned: usize,
}

impl From<BatchReport> for BatchReportResponse {
    fn from(r: BatchReport) -> Self {
        Self {
            status: "ok".to_string(),
            received: r.received,
            filtered: r.filtered,
            duplicates: r.duplicates,
            suppressed: r.suppressed,
            skipped: r.skipped,
            dispatched: r.dispatched,
            failed: r.failed,
            abandoned: r.abandoned,
        }
    }
}

/// Outcome of a top-sales run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SummaryResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Sales ranked in the summary.
    pub sales: usize,
    /// Whether a notification was posted.
    pub dispatched: bool,
}

impl From<SummaryOutcome> for SummaryResponse {
    fn from(o: SummaryOutcome) -> Self {
        let message = if o.dispatched {
            "top sales posted".to_string()
        } else {
            "no sales in the window".to_string()
        };
        Self {
            message,
            sales: o.sales,
            dispatched: o.dispatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_all_counts() {
        let report = BatchReport {
            received: 3,
            dispatched: 1,
            duplicates: 2,
            ..BatchReport::default()
        };
        let json = serde_json::to_value(BatchReportResponse::from(report)).unwrap_or_default();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["received"], 3);
        assert_eq!(json["duplicates"], 2);
        assert_eq!(json["abandoned"], 0);
    }

    #[test]
    fn empty_summary_message() {
        let resp = SummaryResponse::from(SummaryOutcome {
            sales: 0,
            dispatched: false,
        });
        assert_eq!(resp.message, "no sales in the window");
    }
}
