//! Notification sinks.
//!
//! A sink performs exactly one delivery attempt per call and reports the
//! outcome. Spacing and sequencing are the dispatcher's job
//! ([`crate::pipeline::dispatcher`]), not the sink's.

pub mod discord;
pub mod recording;

use async_trait::async_trait;

use crate::domain::NotificationPayload;
use crate::error::RelayError;

pub use discord::DiscordWebhookSink;
pub use recording::{Delivery, RecordingSink};

/// Destination for formatted notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync + std::fmt::Debug {
    /// Delivers one payload.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Dispatch`] on a non-2xx answer or a transport
    /// failure.
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), RelayError>;
}
