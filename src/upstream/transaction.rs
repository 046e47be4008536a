//! Parsed-transaction service used by the webhook path.
//!
//! Webhook deliveries carry only a transaction signature; the sale details
//! are re-fetched from a transaction parsing service keyed by that
//! signature.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::RelayError;

/// Protocol that emitted a parsed action.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceProtocol {
    /// Program address.
    #[serde(default)]
    pub address: String,
    /// Protocol display name, when the parser knows it.
    #[serde(default)]
    pub name: Option<String>,
}

/// Details of a sale action.
#[derive(Debug, Clone, Deserialize)]
pub struct SaleActionInfo {
    /// Buyer wallet.
    #[serde(default)]
    pub buyer: Option<String>,
    /// Seller wallet.
    #[serde(default)]
    pub seller: Option<String>,
    /// Item address.
    #[serde(default)]
    pub nft_address: Option<String>,
    /// Price in native units, already shifted.
    #[serde(default)]
    pub price: Option<serde_json::Number>,
}

/// One action recognized in a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedAction {
    /// Action kind, e.g. `"COMPRESSED_NFT_SALE"`.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Action details.
    #[serde(default)]
    pub info: Option<SaleActionInfo>,
    /// Emitting protocol.
    #[serde(default)]
    pub source_protocol: Option<SourceProtocol>,
}

/// Body of a parse result.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedResult {
    /// ISO-8601 block time.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Recognized actions in execution order.
    #[serde(default)]
    pub actions: Vec<ParsedAction>,
}

/// Parse-service response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTransaction {
    /// Parse result.
    pub result: ParsedResult,
}

/// Source of parsed transactions.
#[async_trait]
pub trait TransactionParser: Send + Sync + std::fmt::Debug {
    /// Fetches the parsed form of the transaction `signature`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the service is unreachable
    /// or answers with an unexpected body.
    async fn parse(&self, signature: &str) -> Result<ParsedTransaction, RelayError>;
}

/// HTTP client for a Shyft-compatible `/sol/v1/transaction/parsed`
/// endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransactionParser {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    network: String,
}

impl HttpTransactionParser {
    /// Creates a parser client.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        network: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            network: network.into(),
        })
    }
}

#[async_trait]
impl TransactionParser for HttpTransactionParser {
    async fn parse(&self, signature: &str) -> Result<ParsedTransaction, RelayError> {
        // Signatures are base58 and network names are plain identifiers, so
        // neither needs percent-encoding.
        let url = format!(
            "{}/sol/v1/transaction/parsed?network={}&txn_signature={signature}",
            self.base_url.trim_end_matches('/'),
            self.network,
        );
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::Infrastructure(format!("transaction parser: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Infrastructure(format!(
                "transaction parser returned {status} for {signature}"
            )));
        }
        let parsed = response.json::<ParsedTransaction>().await.map_err(|e| {
            RelayError::Infrastructure(format!("transaction parser body: {e}"))
        })?;
        tracing::debug!(
            %signature,
            actions = parsed.result.actions.len(),
            "parsed transaction fetched"
        );
        Ok(parsed)
    }
}
