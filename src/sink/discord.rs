//! Discord webhook sink.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::NotificationSink;
use crate::domain::{NotificationPayload, PayloadField};
use crate::error::RelayError;

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    color: u32,
    fields: &'a [PayloadField],
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage<'a>>,
    timestamp: String,
    footer: EmbedFooter<'a>,
}

#[derive(Debug, Serialize)]
struct EmbedImage<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct EmbedFooter<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<&'a str>,
}

impl<'a> WebhookMessage<'a> {
    fn render(payload: &'a NotificationPayload) -> Self {
        Self {
            content: payload.lead.as_deref().filter(|l| !l.is_empty()),
            embeds: [Embed {
                title: &payload.title,
                url: payload.url.as_deref(),
                color: payload.color,
                fields: &payload.fields,
                image: payload.image_uri.as_deref().map(|url| EmbedImage { url }),
                timestamp: payload.timestamp.to_rfc3339(),
                footer: EmbedFooter {
                    text: &payload.footer.text,
                    icon_url: payload.footer.icon_url.as_deref(),
                },
            }],
        }
    }
}

/// Posts payloads as single-embed webhook messages.
#[derive(Debug, Clone)]
pub struct DiscordWebhookSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordWebhookSink {
    /// Creates a sink posting to `webhook_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the HTTP client cannot be built.
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhookSink {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), RelayError> {
        let message = WebhookMessage::render(payload);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| RelayError::Dispatch(format!("webhook: {e}")))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(
                event_id = ?payload.event_id.as_ref().map(|id| id.as_str()),
                status = %status,
                title = %payload.title,
                "notification delivered"
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                event_id = ?payload.event_id.as_ref().map(|id| id.as_str()),
                status = %status,
                body = %body,
                "webhook rejected notification"
            );
            Err(RelayError::Dispatch(format!("webhook returned {status}")))
        }
    }
}
