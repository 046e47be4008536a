//! Poll-mode activity feed.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RelayError;

/// Source of raw activity pages.
#[async_trait]
pub trait ActivityFeed: Send + Sync + std::fmt::Debug {
    /// Fetches the most recent page of raw activity records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::FeedFormat`] if the body is not a JSON array,
    /// and [`RelayError::Infrastructure`] if the upstream is unreachable or
    /// answers with a non-success status.
    async fn fetch_page(&self) -> Result<Vec<serde_json::Value>, RelayError>;
}

/// Rejects any top-level shape other than an array.
///
/// # Errors
///
/// Returns [`RelayError::FeedFormat`] for non-array values.
pub fn expect_array(body: serde_json::Value) -> Result<Vec<serde_json::Value>, RelayError> {
    match body {
        serde_json::Value::Array(records) => Ok(records),
        other => {
            let shape = match other {
                serde_json::Value::Object(_) => "object",
                serde_json::Value::String(_) => "string",
                serde_json::Value::Number(_) => "number",
                serde_json::Value::Bool(_) => "bool",
                _ => "null",
            };
            Err(RelayError::FeedFormat(format!(
                "activities is not an array (got {shape})"
            )))
        }
    }
}

/// Marketplace `/v2/collections/{symbol}/activities` client.
#[derive(Debug, Clone)]
pub struct MarketplaceFeed {
    client: reqwest::Client,
    url: String,
}

impl MarketplaceFeed {
    /// Creates a feed for `collection` on the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        collection: &str,
        page_limit: u32,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("http client: {e}")))?;
        let url = format!(
            "{}/v2/collections/{collection}/activities?offset=0&limit={page_limit}",
            base_url.trim_end_matches('/')
        );
        Ok(Self { client, url })
    }

    /// Endpoint polled by [`ActivityFeed::fetch_page`].
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ActivityFeed for MarketplaceFeed {
    async fn fetch_page(&self) -> Result<Vec<serde_json::Value>, RelayError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| RelayError::Infrastructure(format!("activity feed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "activity feed returned error");
            return Err(RelayError::Infrastructure(format!(
                "activity feed returned {status}"
            )));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| RelayError::FeedFormat(format!("activity feed body: {e}")))?;
        let records = expect_array(body)?;
        tracing::debug!(count = records.len(), "fetched activity page");
        Ok(records)
    }
}
