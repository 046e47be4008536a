//! Relay service: runs one batch through dedup, enrichment, the ledger and
//! dispatch.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::replay::ReplayGuard;
use crate::domain::{Event, EventId, EventKind, LedgerEntry, NotificationPayload};
use crate::error::RelayError;
use crate::pipeline::{Deduplicator, Enricher, Enrichment, Normalizer, RateLimitedDispatcher, Verdict};
use crate::upstream::{ActivityFeed, TransactionParser};

/// Per-batch outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Raw records received.
    pub received: usize,
    /// Out-of-scope records (other kinds, other collections).
    pub filtered: usize,
    /// Events already processed.
    pub duplicates: usize,
    /// Listings dropped by seller-repeat suppression.
    pub suppressed: usize,
    /// Listings dropped for missing metadata.
    pub skipped: usize,
    /// Notifications delivered.
    pub dispatched: usize,
    /// Notifications the sink rejected; their events stay recorded.
    pub failed: usize,
    /// Events left for the next invocation when the batch ran out of time.
    pub abandoned: usize,
}

/// Per-kind delivery queues. Both may share one worker.
#[derive(Debug, Clone)]
pub struct Dispatchers {
    /// Sales and top-sales summaries.
    pub sales: RateLimitedDispatcher,
    /// Listings.
    pub listings: RateLimitedDispatcher,
}

impl Dispatchers {
    /// Same worker for every kind.
    #[must_use]
    pub fn shared(dispatcher: RateLimitedDispatcher) -> Self {
        Self {
            sales: dispatcher.clone(),
            listings: dispatcher,
        }
    }

    fn for_kind(&self, kind: EventKind) -> &RateLimitedDispatcher {
        match kind {
            EventKind::Sale => &self.sales,
            EventKind::Listing => &self.listings,
        }
    }
}

/// Inbound collaborators.
#[derive(Debug, Clone)]
pub struct Upstream {
    /// Poll-mode activity feed.
    pub feed: Arc<dyn ActivityFeed>,
    /// Parsed-transaction service for webhook deliveries.
    pub parser: Arc<dyn TransactionParser>,
}

/// Orchestrates batches.
///
/// Within a batch, events are handled strictly one after another; across
/// concurrent batches the ledger's insert-if-absent is the only
/// serialization point.
#[derive(Debug)]
pub struct RelayService {
    normalizer: Normalizer,
    dedup: Arc<Deduplicator>,
    enricher: Enricher,
    dispatchers: Dispatchers,
    upstream: Upstream,
    batch_budget: Duration,
    replays: ReplayGuard,
}

impl RelayService {
    /// Creates a new `RelayService`.
    #[must_use]
    pub fn new(
        normalizer: Normalizer,
        dedup: Arc<Deduplicator>,
        enricher: Enricher,
        dispatchers: Dispatchers,
        upstream: Upstream,
        batch_budget: Duration,
    ) -> Self {
        Self {
            normalizer,
            dedup,
            enricher,
            dispatchers,
            upstream,
            batch_budget,
            replays: ReplayGuard::default(),
        }
    }

    /// Returns the deduplicator.
    #[must_use]
    pub fn dedup(&self) -> &Arc<Deduplicator> {
        &self.dedup
    }

    /// Fetches the latest feed page and announces new sales.
    ///
    /// # Errors
    ///
    /// See [`RelayService::process_batch`]; also fails if the feed is
    /// unreachable or not an array.
    pub async fn poll_sales(&self) -> Result<BatchReport, RelayError> {
        let records = self.upstream.feed.fetch_page().await?;
        self.process_batch(&records, EventKind::Sale).await
    }

    /// Fetches the latest feed page and announces new listings.
    ///
    /// # Errors
    ///
    /// See [`RelayService::poll_sales`].
    pub async fn poll_listings(&self) -> Result<BatchReport, RelayError> {
        let records = self.upstream.feed.fetch_page().await?;
        self.process_batch(&records, EventKind::Listing).await
    }

    /// Runs a raw page through the pipeline, announcing events of `kind`.
    ///
    /// The whole page is normalized first; a malformed record aborts the
    /// batch before anything is read or written.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Normalization`] for malformed records and
    /// [`RelayError::Infrastructure`] if the ledger or the metadata source
    /// fails. Sink failures are counted, not returned.
    pub async fn process_batch(
        &self,
        records: &[serde_json::Value],
        kind: EventKind,
    ) -> Result<BatchReport, RelayError> {
        let batch = self.normalizer.normalize_batch(records)?;
        self.dedup
            .refresh_window(batch.events.iter().map(|e| &e.event_id));

        let (events, other): (Vec<Event>, Vec<Event>) =
            batch.events.into_iter().partition(|e| e.kind == kind);
        let mut report = BatchReport {
            received: records.len(),
            filtered: batch.filtered + other.len(),
            ..BatchReport::default()
        };
        self.run(events, &mut report).await?;
        tracing::info!(kind = %kind, ?report, "batch processed");
        Ok(report)
    }

    /// Handles a push delivery: a JSON array whose first element carries
    /// the transaction signature.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::FeedFormat`] if no signature is present,
    /// [`RelayError::UnsupportedAction`] if the transaction is not a sale,
    /// and [`RelayError::Infrastructure`] if the parser, the ledger or the
    /// metadata source fails. A retryable failure is forgotten by the
    /// redelivery guard so the provider's retry gets through.
    pub async fn handle_webhook(&self, body: &serde_json::Value) -> Result<BatchReport, RelayError> {
        let signature = body
            .as_array()
            .and_then(|items| items.first())
            .and_then(|first| first.get("signature"))
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RelayError::FeedFormat("no signature in webhook body".to_string()))?;

        let mut report = BatchReport {
            received: 1,
            ..BatchReport::default()
        };
        if self.replays.is_replay(signature) {
            tracing::info!(%signature, "webhook redelivery ignored");
            report.duplicates = 1;
            return Ok(report);
        }

        if let Err(e) = self.announce_parsed(signature, &mut report).await {
            if e.is_retryable() {
                self.replays.forget(signature);
            }
            return Err(e);
        }
        tracing::info!(%signature, ?report, "webhook processed");
        Ok(report)
    }

    async fn announce_parsed(&self, signature: &str, report: &mut BatchReport) -> Result<(), RelayError> {
        let parsed = self.upstream.parser.parse(signature).await?;
        let event = self.normalizer.normalize_parsed(signature, &parsed)?;
        self.run(vec![event], report).await
    }

    async fn run(&self, events: Vec<Event>, report: &mut BatchReport) -> Result<(), RelayError> {
        let deadline = Instant::now() + self.batch_budget;
        let total = events.len();
        for (done, event) in events.into_iter().enumerate() {
            let event_id = event.event_id.clone();
            let recorded = if Instant::now() >= deadline {
                None
            } else {
                tokio::time::timeout_at(deadline, self.record_event(event, report))
                    .await
                    .ok()
            };
            match recorded {
                Some(outcome) => {
                    // Recorded events are delivered regardless of the deadline.
                    if let Some(pending) = outcome? {
                        self.announce(pending, report).await;
                    }
                }
                None => {
                    report.abandoned = total - done;
                    tracing::warn!(
                        %event_id,
                        abandoned = report.abandoned,
                        "batch budget exhausted, leaving the rest for the next run"
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    /// Checks, enriches and records one event. Returns the notification
    /// still owed when this call wrote the ledger entry.
    async fn record_event(&self, event: Event, report: &mut BatchReport) -> Result<Option<Pending>, RelayError> {
        match self.dedup.check(&event).await? {
            Verdict::New => {}
            Verdict::Duplicate => {
                tracing::debug!(event_id = %event.event_id, "already processed");
                report.duplicates += 1;
                return Ok(None);
            }
            Verdict::SellerRepeat => {
                tracing::info!(
                    event_id = %event.event_id,
                    item_id = %event.item_id,
                    seller = %event.counterparties.seller,
                    "repeat listing by same seller suppressed"
                );
                report.suppressed += 1;
                return Ok(None);
            }
        }

        let enriched = match self.enricher.enrich(&event).await? {
            Enrichment::Ready(enriched) => *enriched,
            Enrichment::Skipped => {
                report.skipped += 1;
                return Ok(None);
            }
        };

        let kind = enriched.event.kind;
        let entry = LedgerEntry::new(enriched.event, Some(enriched.item_name));
        if !self.dedup.commit(&entry).await? {
            tracing::info!(event_id = %entry.event_id(), "another invocation recorded this event first");
            report.duplicates += 1;
            return Ok(None);
        }
        Ok(Some(Pending {
            kind,
            event_id: entry.event_id().clone(),
            payload: enriched.payload,
        }))
    }

    async fn announce(&self, pending: Pending, report: &mut BatchReport) {
        match self.dispatchers.for_kind(pending.kind).dispatch(pending.payload).await {
            Ok(()) => report.dispatched += 1,
            Err(e) => {
                tracing::warn!(
                    event_id = %pending.event_id,
                    error = %e,
                    "notification failed; event stays recorded"
                );
                report.failed += 1;
            }
        }
    }
}

/// Notification owed for an event this invocation recorded.
#[derive(Debug)]
struct Pending {
    kind: EventKind,
    event_id: EventId,
    payload: NotificationPayload,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::domain::{Attribute, EventId, ItemMetadata, TraitTable};
    use crate::ledger::{Ledger, MemoryLedger};
    use crate::pipeline::Presentation;
    use crate::sink::RecordingSink;
    use crate::upstream::transaction::ParsedTransaction;
    use crate::upstream::{MetadataLookup, SnapshotMetadata};

    #[derive(Debug)]
    struct StaticFeed(Vec<Value>);

    #[async_trait]
    impl ActivityFeed for StaticFeed {
        async fn fetch_page(&self) -> Result<Vec<Value>, RelayError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug)]
    struct StaticParser(Value);

    #[async_trait]
    impl TransactionParser for StaticParser {
        async fn parse(&self, _signature: &str) -> Result<ParsedTransaction, RelayError> {
            serde_json::from_value(self.0.clone())
                .map_err(|e| RelayError::Infrastructure(e.to_string()))
        }
    }

    #[derive(Debug)]
    struct SlowMetadata(Duration);

    #[async_trait]
    impl MetadataLookup for SlowMetadata {
        async fn lookup(&self, _item_id: &str) -> Result<Option<ItemMetadata>, RelayError> {
            tokio::time::sleep(self.0).await;
            Ok(None)
        }
    }

    struct Harness {
        service: RelayService,
        ledger: Arc<MemoryLedger>,
        sink: Arc<RecordingSink>,
    }

    fn snapshot() -> SnapshotMetadata {
        let mut snapshot = SnapshotMetadata::default();
        for item in ["it1", "it2", "X"] {
            snapshot.insert(
                item,
                ItemMetadata {
                    name: format!("Saga Monke {item}"),
                    image_uri: Some(format!("https://img/{item}.png")),
                    attributes: vec![Attribute::new("Head", "Crown")],
                },
            );
        }
        snapshot
    }

    fn harness_with(metadata: Arc<dyn MetadataLookup>, feed: Vec<Value>, budget: Duration) -> Harness {
        build_harness(metadata, feed, budget, RecordingSink::new(), |ledger| {
            Deduplicator::persistent(ledger, 10)
        })
    }

    fn build_harness(
        metadata: Arc<dyn MetadataLookup>,
        feed: Vec<Value>,
        budget: Duration,
        sink: RecordingSink,
        dedup: impl FnOnce(Arc<MemoryLedger>) -> Deduplicator,
    ) -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let sink = Arc::new(sink);
        let dispatcher = RateLimitedDispatcher::spawn(
            Arc::<RecordingSink>::clone(&sink),
            Duration::from_millis(1),
        );
        let Ok(traits) = TraitTable::embedded() else {
            panic!("embedded trait table must parse");
        };
        let enricher = Enricher::new(
            metadata,
            Arc::new(traits),
            Presentation {
                collection_label: "Saga Monke".to_string(),
                footer_text: "MonkeSales".to_string(),
                footer_icon_url: None,
            },
        );
        let parser = StaticParser(json!({"result": {
            "timestamp": "2024-06-07T12:00:00Z",
            "actions": [{"type": "COMPRESSED_NFT_SALE",
                "info": {"buyer": "B", "seller": "A", "nft_address": "it2", "price": 2.5},
                "source_protocol": {"address": "TCMPhJdwDryooaGtiocG1u3xcYbRpiJzb283XfCZsDp"}}]
        }}));
        let service = RelayService::new(
            Normalizer::new("saga_monkes", 9),
            Arc::new(dedup(Arc::<MemoryLedger>::clone(&ledger))),
            enricher,
            Dispatchers::shared(dispatcher),
            Upstream {
                feed: Arc::new(StaticFeed(feed)),
                parser: Arc::new(parser),
            },
            budget,
        );
        Harness {
            service,
            ledger,
            sink,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(snapshot()), Vec::new(), Duration::from_secs(5))
    }

    fn canonical(id: &str, kind: &str, item: &str, seller: &str) -> Value {
        let mut record = json!({
            "eventId": id,
            "kind": kind,
            "itemId": item,
            "seller": seller,
            "price": {"raw": 5_000_000_000_u64, "decimals": 9},
            "timestamp": 1_700_000_000,
            "source": "tensor_v2",
        });
        if kind == "sale" {
            record["buyer"] = json!("B");
        }
        record
    }

    #[tokio::test]
    async fn end_to_end_single_sale() {
        let h = harness();
        let batch = vec![canonical("s1", "sale", "it1", "A")];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Sale).await else {
            panic!("batch should succeed");
        };
        assert_eq!(report.dispatched, 1);

        assert!(matches!(h.ledger.get(&EventId::new("s1")).await, Ok(Some(_))));
        let delivered = h.sink.delivered().await;
        let Some(payload) = delivered.first() else {
            panic!("one payload expected");
        };
        let value_of = |name: &str| {
            payload
                .fields
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.value.clone())
        };
        assert_eq!(value_of(":moneybag:  Sale Price").as_deref(), Some("**5.00 SOL**"));
        assert_eq!(value_of("Seller").as_deref(), Some("A"));
        assert_eq!(value_of("Buyer").as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn same_batch_twice_notifies_once() {
        let h = harness();
        let batch = vec![
            canonical("s1", "sale", "it1", "A"),
            canonical("s2", "sale", "it2", "A"),
        ];
        let first = h.service.process_batch(&batch, EventKind::Sale).await;
        let second = h.service.process_batch(&batch, EventKind::Sale).await;
        assert!(matches!(first, Ok(r) if r.dispatched == 2));
        assert!(matches!(second, Ok(r) if r.dispatched == 0 && r.duplicates == 2));
        assert_eq!(h.ledger.len().await, 2);
        assert_eq!(h.sink.delivered().await.len(), 2);
    }

    #[tokio::test]
    async fn repeated_id_within_batch_dispatches_once() {
        let h = harness();
        let batch = vec![
            canonical("A", "sale", "it1", "S"),
            canonical("B", "sale", "it2", "S"),
            canonical("A", "sale", "it1", "S"),
        ];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Sale).await else {
            panic!("batch should succeed");
        };
        assert_eq!(report.dispatched, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(h.ledger.len().await, 2);
    }

    #[tokio::test]
    async fn listing_without_metadata_leaves_no_trace() {
        let h = harness();
        let batch = vec![canonical("l1", "listing", "nobody", "S")];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Listing).await else {
            panic!("batch should succeed");
        };
        assert_eq!(report.skipped, 1);
        assert!(h.ledger.is_empty().await);
        assert!(h.sink.deliveries().await.is_empty());
    }

    #[tokio::test]
    async fn sale_without_metadata_is_still_announced() {
        let h = harness();
        let batch = vec![canonical("s9", "sale", "nobody", "A")];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Sale).await else {
            panic!("batch should succeed");
        };
        assert_eq!(report.dispatched, 1);
        assert_eq!(h.ledger.len().await, 1);
    }

    #[tokio::test]
    async fn seller_repeat_listing_is_suppressed() {
        let h = harness();
        let mut prior = vec![canonical("p0", "listing", "X", "S")];
        prior.extend((1..10).map(|i| canonical(&format!("p{i}"), "listing", "X", &format!("o{i}"))));
        let Ok(seeded) = h.service.process_batch(&prior, EventKind::Listing).await else {
            panic!("seed batch should succeed");
        };
        assert_eq!(seeded.dispatched, 10);

        let batch = vec![
            canonical("n-s", "listing", "X", "S"),
            canonical("n-t", "listing", "X", "T"),
        ];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Listing).await else {
            panic!("batch should succeed");
        };
        assert_eq!(report.suppressed, 1);
        assert_eq!(report.dispatched, 1);
    }

    #[tokio::test]
    async fn other_kinds_and_collections_are_filtered() {
        let h = harness();
        let mut foreign = canonical("f1", "sale", "it1", "A");
        foreign["collectionId"] = json!("other_collection");
        let batch = vec![
            canonical("l1", "listing", "it1", "S"),
            foreign,
            json!({"signature": "bid1", "type": "bid", "tokenMint": "it1"}),
        ];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Sale).await else {
            panic!("batch should succeed");
        };
        assert_eq!(report.received, 3);
        assert_eq!(report.filtered, 3);
        assert_eq!(report.dispatched, 0);
    }

    #[tokio::test]
    async fn malformed_record_aborts_before_any_write() {
        let h = harness();
        let batch = vec![
            canonical("s1", "sale", "it1", "A"),
            json!({"eventId": "s2", "kind": "sale", "itemId": "it2"}),
        ];
        let result = h.service.process_batch(&batch, EventKind::Sale).await;
        assert!(matches!(result, Err(RelayError::Normalization(_))));
        assert!(h.ledger.is_empty().await);
        assert!(h.sink.deliveries().await.is_empty());
    }

    #[tokio::test]
    async fn sink_failure_keeps_entry_and_continues() {
        let h = harness();
        h.sink.fail_for("s1").await;
        let batch = vec![
            canonical("s1", "sale", "it1", "A"),
            canonical("s2", "sale", "it2", "A"),
        ];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Sale).await else {
            panic!("batch should succeed");
        };
        assert_eq!(report.failed, 1);
        assert_eq!(report.dispatched, 1);
        assert!(matches!(h.ledger.get(&EventId::new("s1")).await, Ok(Some(_))));

        let again = h.service.process_batch(&batch, EventKind::Sale).await;
        assert!(matches!(again, Ok(r) if r.duplicates == 2 && r.failed == 0));
    }

    #[tokio::test]
    async fn exhausted_budget_abandons_the_rest() {
        let h = harness_with(
            Arc::new(SlowMetadata(Duration::from_millis(200))),
            Vec::new(),
            Duration::from_millis(50),
        );
        let batch = vec![
            canonical("s1", "sale", "it1", "A"),
            canonical("s2", "sale", "it2", "A"),
        ];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Sale).await else {
            panic!("batch should return normally");
        };
        assert_eq!(report.abandoned, 2);
        assert!(h.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn slow_delivery_after_commit_is_not_abandoned() {
        let h = build_harness(
            Arc::new(snapshot()),
            Vec::new(),
            Duration::from_millis(50),
            RecordingSink::with_latency(Duration::from_millis(200)),
            |ledger| Deduplicator::persistent(ledger, 10),
        );
        let batch = vec![canonical("s1", "sale", "it1", "A")];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Sale).await else {
            panic!("batch should return normally");
        };
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.abandoned, 0);
        assert!(matches!(h.ledger.get(&EventId::new("s1")).await, Ok(Some(_))));
        assert_eq!(h.sink.delivered().await.len(), 1);

        let Ok(rerun) = h.service.process_batch(&batch, EventKind::Sale).await else {
            panic!("rerun should return normally");
        };
        assert_eq!(rerun.duplicates, 1);
        assert_eq!(rerun.dispatched, 0);
    }

    #[tokio::test]
    async fn events_after_an_overrun_delivery_are_abandoned() {
        let h = build_harness(
            Arc::new(snapshot()),
            Vec::new(),
            Duration::from_millis(50),
            RecordingSink::with_latency(Duration::from_millis(200)),
            |ledger| Deduplicator::persistent(ledger, 10),
        );
        let batch = vec![
            canonical("s1", "sale", "it1", "A"),
            canonical("s2", "sale", "it2", "A"),
        ];
        let Ok(report) = h.service.process_batch(&batch, EventKind::Sale).await else {
            panic!("batch should return normally");
        };
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.abandoned, 1);
        assert_eq!(h.ledger.len().await, 1);
        assert!(matches!(h.ledger.get(&EventId::new("s2")).await, Ok(None)));
    }

    #[tokio::test]
    async fn window_mode_deduplicates_only_while_on_the_page() {
        let h = build_harness(
            Arc::new(snapshot()),
            Vec::new(),
            Duration::from_secs(5),
            RecordingSink::new(),
            |_| Deduplicator::recent_window(),
        );
        let s1 = vec![canonical("s1", "sale", "it1", "A")];
        let s2 = vec![canonical("s2", "sale", "it2", "A")];

        let first = h.service.process_batch(&s1, EventKind::Sale).await;
        let second = h.service.process_batch(&s1, EventKind::Sale).await;
        assert!(matches!(first, Ok(r) if r.dispatched == 1));
        assert!(matches!(second, Ok(r) if r.dispatched == 0 && r.duplicates == 1));

        // s1 falls off the page, so its reappearance is announced again.
        let third = h.service.process_batch(&s2, EventKind::Sale).await;
        let fourth = h.service.process_batch(&s1, EventKind::Sale).await;
        assert!(matches!(third, Ok(r) if r.dispatched == 1));
        assert!(matches!(fourth, Ok(r) if r.dispatched == 1));

        assert!(h.ledger.is_empty().await);
        assert_eq!(h.sink.delivered().await.len(), 3);
    }

    #[tokio::test]
    async fn poll_uses_feed_page() {
        let page = vec![json!({
            "signature": "sig-buy",
            "type": "buyNow",
            "tokenMint": "it1",
            "collection": "saga_monkes",
            "seller": "A",
            "buyer": "B",
            "price": 5.0,
            "blockTime": 1_700_000_000,
            "source": "magic_eden_v2",
        })];
        let h = harness_with(Arc::new(snapshot()), page, Duration::from_secs(5));
        assert!(matches!(h.service.poll_sales().await, Ok(r) if r.dispatched == 1));
        assert!(matches!(h.service.poll_listings().await, Ok(r) if r.filtered == 1));
    }

    #[tokio::test]
    async fn webhook_sale_and_redelivery() {
        let h = harness();
        let body = json!([{"signature": "sig-hook"}]);
        assert!(matches!(h.service.handle_webhook(&body).await, Ok(r) if r.dispatched == 1));
        assert!(matches!(h.service.handle_webhook(&body).await, Ok(r) if r.duplicates == 1));
        assert!(matches!(h.ledger.get(&EventId::new("sig-hook")).await, Ok(Some(_))));
    }

    #[derive(Debug)]
    struct DownParser;

    #[async_trait]
    impl TransactionParser for DownParser {
        async fn parse(&self, signature: &str) -> Result<ParsedTransaction, RelayError> {
            Err(RelayError::Infrastructure(format!("parser down for {signature}")))
        }
    }

    #[tokio::test]
    async fn webhook_retry_after_parser_outage_is_not_a_replay() {
        let mut h = harness();
        h.service.upstream.parser = Arc::new(DownParser);
        let body = json!([{"signature": "sig-down"}]);
        assert!(matches!(
            h.service.handle_webhook(&body).await,
            Err(RelayError::Infrastructure(_))
        ));
        assert!(matches!(
            h.service.handle_webhook(&body).await,
            Err(RelayError::Infrastructure(_))
        ));
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let h = harness();
        let result = h.service.handle_webhook(&json!([{}])).await;
        assert!(matches!(result, Err(RelayError::FeedFormat(_))));
        let result = h.service.handle_webhook(&json!({"signature": "x"})).await;
        assert!(matches!(result, Err(RelayError::FeedFormat(_))));
    }
}
