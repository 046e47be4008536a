//! Sink-agnostic notification payload.
//!
//! Built by the enricher and the top-sales aggregator, rendered to the
//! concrete wire format (a Discord embed) by the sink. Never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::EventId;

/// Accent color of sale notifications.
pub const SALE_COLOR: u32 = 16_486_972;

/// Accent color of listing notifications.
pub const LISTING_COLOR: u32 = 8_388_736;

/// A titled field in the notification body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadField {
    /// Field label.
    pub name: String,
    /// Field body (markdown allowed).
    pub value: String,
    /// Whether the sink may lay this field out side by side with others.
    pub inline: bool,
}

impl PayloadField {
    /// Creates a field.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Footer line with optional icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Footer {
    /// Footer text.
    pub text: String,
    /// Footer icon URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Formatted message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    /// Event this payload announces; `None` for summaries.
    pub event_id: Option<EventId>,
    /// Plain-text lead addressing recipient groups, if any.
    pub lead: Option<String>,
    /// Notification title.
    pub title: String,
    /// Link attached to the title.
    pub url: Option<String>,
    /// Accent color (24-bit RGB).
    pub color: u32,
    /// Body fields in display order.
    pub fields: Vec<PayloadField>,
    /// Large image.
    pub image_uri: Option<String>,
    /// Footer line.
    pub footer: Footer,
    /// Notify groups addressed by [`NotificationPayload::lead`].
    pub recipient_groups: Vec<String>,
    /// Message timestamp.
    pub timestamp: DateTime<Utc>,
}
