//! Trailing-window top-sales summary.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::domain::{LedgerEntry, NotificationPayload, PayloadField, SALE_COLOR};
use crate::error::RelayError;
use crate::ledger::Ledger;
use crate::pipeline::enricher::display_name;
use crate::pipeline::{Presentation, RateLimitedDispatcher};

/// Outcome of one summary run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryOutcome {
    /// Sales ranked.
    pub sales: usize,
    /// Whether a notification went out.
    pub dispatched: bool,
}

/// Ranks recent sales by price and posts one summary.
#[derive(Debug, Clone)]
pub struct TopSalesAggregator {
    ledger: Option<Arc<dyn Ledger>>,
    dispatcher: RateLimitedDispatcher,
    collection_id: String,
    limit: usize,
    window: chrono::Duration,
    presentation: Presentation,
}

impl TopSalesAggregator {
    /// Creates an aggregator. Without a ledger every run fails; there is
    /// nothing to rank in degraded mode.
    #[must_use]
    pub fn new(
        ledger: Option<Arc<dyn Ledger>>,
        dispatcher: RateLimitedDispatcher,
        collection_id: impl Into<String>,
        limit: usize,
        window: chrono::Duration,
        presentation: Presentation,
    ) -> Self {
        Self {
            ledger,
            dispatcher,
            collection_id: collection_id.into(),
            limit,
            window,
            presentation,
        }
    }

    /// Queries the window and dispatches the summary. An empty window is a
    /// successful no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] without a ledger,
    /// [`RelayError::Infrastructure`] if the ledger fails, and
    /// [`RelayError::Dispatch`] if the sink rejects the summary.
    pub async fn run(&self) -> Result<SummaryOutcome, RelayError> {
        let ledger = self.ledger.as_ref().ok_or_else(|| {
            RelayError::Config("top sales need a persistent ledger".to_string())
        })?;
        let since = Utc::now() - self.window;
        let sales = ledger.top_sales(&self.collection_id, since, self.limit).await?;
        if sales.is_empty() {
            tracing::info!(since = %since, "no sales in window, nothing to post");
            return Ok(SummaryOutcome {
                sales: 0,
                dispatched: false,
            });
        }

        let payload = self.summary(&sales);
        self.dispatcher.dispatch(payload).await?;
        tracing::info!(sales = sales.len(), "top sales posted");
        Ok(SummaryOutcome {
            sales: sales.len(),
            dispatched: true,
        })
    }

    fn summary(&self, sales: &[LedgerEntry]) -> NotificationPayload {
        let label = &self.presentation.collection_label;
        let hours = self.window.num_hours();
        let fields = sales
            .iter()
            .enumerate()
            .map(|(rank, entry)| {
                let name = entry.item_name.clone().unwrap_or_else(|| {
                    display_name(label, entry.event.image_uri.as_deref())
                });
                PayloadField::new(
                    format!("{}", rank + 1),
                    format!(
                        "[{name}](https://solana.fm/address/{})\nPrice: {} ◎",
                        entry.event.item_id, entry.event.price
                    ),
                    true,
                )
            })
            .collect();

        NotificationPayload {
            event_id: None,
            lead: None,
            title: format!("Top {label} {hours}hr Sales"),
            url: None,
            color: SALE_COLOR,
            fields,
            image_uri: sales.first().and_then(|top| top.event.image_uri.clone()),
            footer: self
                .presentation
                .footer(format!("{}: {hours}hr Sales", self.presentation.footer_text)),
            recipient_groups: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::sink::RecordingSink;
    use crate::testing::{listing, sale};

    fn presentation() -> Presentation {
        Presentation {
            collection_label: "Saga Monke".to_string(),
            footer_text: "MonkeSales".to_string(),
            footer_icon_url: None,
        }
    }

    fn aggregator(ledger: Option<Arc<dyn Ledger>>, sink: &Arc<RecordingSink>) -> TopSalesAggregator {
        let dispatcher = RateLimitedDispatcher::spawn(
            Arc::<RecordingSink>::clone(sink),
            Duration::from_millis(1),
        );
        TopSalesAggregator::new(
            ledger,
            dispatcher,
            "saga_monkes",
            12,
            chrono::Duration::hours(24),
            presentation(),
        )
    }

    #[tokio::test]
    async fn empty_window_posts_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let agg = aggregator(Some(Arc::new(MemoryLedger::new())), &sink);
        assert!(matches!(
            agg.run().await,
            Ok(SummaryOutcome { sales: 0, dispatched: false })
        ));
        assert!(sink.deliveries().await.is_empty());
    }

    #[tokio::test]
    async fn ranks_sales_by_price() {
        let ledger = Arc::new(MemoryLedger::new());
        let mut cheap = sale("s1", "it1", "A", "B", 1_000_000_000);
        cheap.image_uri = Some("https://img/11.png".to_string());
        let mut pricey = sale("s2", "it2", "A", "B", 7_500_000_000);
        pricey.image_uri = Some("https://img/22.png".to_string());
        for entry in [
            LedgerEntry::new(cheap, None),
            LedgerEntry::new(pricey, Some("Saga Monke #22".to_string())),
            LedgerEntry::new(listing("l1", "it3", "S", 9_000_000_000), None),
        ] {
            let _ = ledger.put_if_absent(&entry).await;
        }

        let sink = Arc::new(RecordingSink::new());
        let agg = aggregator(Some(ledger), &sink);
        assert!(matches!(
            agg.run().await,
            Ok(SummaryOutcome { sales: 2, dispatched: true })
        ));

        let delivered = sink.delivered().await;
        let Some(summary) = delivered.first() else {
            panic!("summary expected");
        };
        assert_eq!(summary.title, "Top Saga Monke 24hr Sales");
        assert_eq!(summary.footer.text, "MonkeSales: 24hr Sales");
        assert_eq!(summary.image_uri.as_deref(), Some("https://img/22.png"));
        let values: Vec<(&str, &str)> = summary
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("1", "[Saga Monke #22](https://solana.fm/address/it2)\nPrice: 7.50 ◎"),
                ("2", "[Saga Monke #11](https://solana.fm/address/it1)\nPrice: 1.00 ◎"),
            ]
        );
    }

    #[tokio::test]
    async fn degraded_mode_has_no_summary() {
        let sink = Arc::new(RecordingSink::new());
        let agg = aggregator(None, &sink);
        assert!(matches!(agg.run().await, Err(RelayError::Config(_))));
    }
}
