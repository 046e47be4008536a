//! In-memory sink that records every delivery attempt.
//!
//! Backs the unit and HTTP-level test suites, where it stands in for the
//! webhook and captures delivery timing.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::NotificationSink;
use crate::domain::{EventId, NotificationPayload};
use crate::error::RelayError;

/// One recorded delivery attempt.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The payload as handed to the sink.
    pub payload: NotificationPayload,
    /// When the attempt started.
    pub started: Instant,
    /// When the attempt finished.
    pub finished: Instant,
    /// Whether the attempt was reported as successful.
    pub succeeded: bool,
}

/// Sink double with optional latency and per-event failure injection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    latency: Duration,
    failing: Mutex<HashSet<EventId>>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingSink {
    /// Creates a sink that answers immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that takes `latency` per delivery.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Makes deliveries for `event_id` fail from now on.
    pub async fn fail_for(&self, event_id: impl Into<EventId>) {
        self.failing.lock().await.insert(event_id.into());
    }

    /// All attempts so far, in order.
    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().await.clone()
    }

    /// Payloads of the successful attempts, in order.
    pub async fn delivered(&self) -> Vec<NotificationPayload> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter(|d| d.succeeded)
            .map(|d| d.payload.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), RelayError> {
        let started = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let fails = match &payload.event_id {
            Some(id) => self.failing.lock().await.contains(id),
            None => false,
        };
        self.deliveries.lock().await.push(Delivery {
            payload: payload.clone(),
            started,
            finished: Instant::now(),
            succeeded: !fails,
        });
        if fails {
            return Err(RelayError::Dispatch("recording sink: injected failure".to_string()));
        }
        tracing::debug!(title = %payload.title, "notification recorded");
        Ok(())
    }
}
