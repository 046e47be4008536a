//! Serialized, rate-limited delivery.
//!
//! One background worker owns the sink and drains a queue, so deliveries
//! never overlap. The worker waits `min_interval` between the end of one
//! delivery and the start of the next. Callers get each delivery's outcome
//! back through a oneshot; failures are not retried.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::domain::NotificationPayload;
use crate::error::RelayError;
use crate::sink::NotificationSink;

const QUEUE_CAPACITY: usize = 256;

struct Job {
    payload: NotificationPayload,
    reply: oneshot::Sender<Result<(), RelayError>>,
}

/// Handle to the delivery worker. Cheap to clone; all clones share one
/// queue and one spacing clock.
#[derive(Debug, Clone)]
pub struct RateLimitedDispatcher {
    sender: mpsc::Sender<Job>,
    min_interval: Duration,
}

impl RateLimitedDispatcher {
    /// Spawns the worker for `sink`. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn spawn(sink: Arc<dyn NotificationSink>, min_interval: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(Self::run(sink, receiver, min_interval));
        Self {
            sender,
            min_interval,
        }
    }

    /// Configured spacing between deliveries.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Queues `payload` and waits for its delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`RelayError::Dispatch`] on failure, or
    /// [`RelayError::Internal`] if the worker has stopped.
    pub async fn dispatch(&self, payload: NotificationPayload) -> Result<(), RelayError> {
        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(Job { payload, reply })
            .await
            .map_err(|_| RelayError::Internal("dispatcher stopped".to_string()))?;
        outcome
            .await
            .map_err(|_| RelayError::Internal("dispatcher dropped delivery".to_string()))?
    }

    async fn run(
        sink: Arc<dyn NotificationSink>,
        mut receiver: mpsc::Receiver<Job>,
        min_interval: Duration,
    ) {
        let mut last_finished: Option<Instant> = None;
        while let Some(job) = receiver.recv().await {
            if let Some(finished) = last_finished {
                tokio::time::sleep_until(finished + min_interval).await;
            }
            let result = sink.deliver(&job.payload).await;
            last_finished = Some(Instant::now());
            if let Err(e) = &result {
                tracing::warn!(title = %job.payload.title, error = %e, "delivery failed");
            }
            if job.reply.send(result).is_err() {
                tracing::debug!("delivery outcome discarded; caller gave up");
            }
        }
        tracing::debug!("dispatcher queue closed");
    }
}
