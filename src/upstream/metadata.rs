//! Item metadata lookup.
//!
//! [`SnapshotMetadata`] serves a static JSON snapshot; [`DasMetadata`]
//! queries a DAS `getAsset` JSON-RPC endpoint; [`ChainedMetadata`] tries
//! sources in order. "Not found" is an expected answer, not an error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::item_metadata::deserialize_attributes;
use crate::domain::{Attribute, ItemMetadata};
use crate::error::RelayError;

/// Lookup of off-chain metadata by item id.
#[async_trait]
pub trait MetadataLookup: Send + Sync + std::fmt::Debug {
    /// Returns the item's metadata, or `None` if the item is not indexed.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the backing service is
    /// unreachable.
    async fn lookup(&self, item_id: &str) -> Result<Option<ItemMetadata>, RelayError>;
}

#[derive(Debug, Deserialize)]
struct SnapshotItem {
    mint: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default, deserialize_with = "deserialize_attributes")]
    attributes: Vec<Attribute>,
}

/// Metadata served from an immutable snapshot keyed by mint address.
#[derive(Debug, Clone, Default)]
pub struct SnapshotMetadata {
    items: HashMap<String, ItemMetadata>,
}

impl SnapshotMetadata {
    /// Parses a JSON array of `{mint, name, image, attributes}` items.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: Vec<SnapshotItem> = serde_json::from_str(json)?;
        let items = raw
            .into_iter()
            .map(|item| {
                (
                    item.mint,
                    ItemMetadata {
                        name: item.name,
                        image_uri: item.image,
                        attributes: item.attributes,
                    },
                )
            })
            .collect();
        Ok(Self { items })
    }

    /// Loads a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if the file is unreadable or
    /// malformed.
    pub fn load(path: &Path) -> Result<Self, RelayError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json).map_err(|e| RelayError::Config(format!("{}: {e}", path.display())))
    }

    /// Adds or replaces one item.
    pub fn insert(&mut self, item_id: impl Into<String>, metadata: ItemMetadata) {
        self.items.insert(item_id.into(), metadata);
    }

    /// Number of items in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl MetadataLookup for SnapshotMetadata {
    async fn lookup(&self, item_id: &str) -> Result<Option<ItemMetadata>, RelayError> {
        Ok(self.items.get(item_id).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct DasResponse {
    #[serde(default)]
    result: Option<DasAsset>,
    #[serde(default)]
    error: Option<DasError>,
}

#[derive(Debug, Deserialize)]
struct DasError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct DasAsset {
    #[serde(default)]
    content: Option<DasContent>,
}

#[derive(Debug, Deserialize)]
struct DasContent {
    #[serde(default)]
    metadata: Option<DasMetadataBlock>,
    #[serde(default)]
    links: Option<DasLinks>,
    #[serde(default)]
    files: Vec<DasFile>,
}

#[derive(Debug, Deserialize)]
struct DasMetadataBlock {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_attributes")]
    attributes: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
struct DasLinks {
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DasFile {
    #[serde(default)]
    uri: Option<String>,
}

impl DasAsset {
    fn into_metadata(self) -> Option<ItemMetadata> {
        let content = self.content?;
        let block = content.metadata?;
        let name = block.name.filter(|n| !n.is_empty())?;
        let image_uri = content
            .links
            .and_then(|l| l.image)
            .or_else(|| content.files.into_iter().find_map(|f| f.uri));
        Some(ItemMetadata {
            name,
            image_uri,
            attributes: block.attributes,
        })
    }
}

/// DAS `getAsset` JSON-RPC client.
#[derive(Debug, Clone)]
pub struct DasMetadata {
    client: reqwest::Client,
    rpc_url: String,
}

impl DasMetadata {
    /// Creates a client for `rpc_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the HTTP client cannot be built.
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
        })
    }
}

#[async_trait]
impl MetadataLookup for DasMetadata {
    async fn lookup(&self, item_id: &str) -> Result<Option<ItemMetadata>, RelayError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "sales-relay",
            "method": "getAsset",
            "params": { "id": item_id },
        });
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Infrastructure(format!("asset rpc: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Infrastructure(format!("asset rpc returned {status}")));
        }
        let parsed = response
            .json::<DasResponse>()
            .await
            .map_err(|e| RelayError::Infrastructure(format!("asset rpc body: {e}")))?;

        if let Some(error) = parsed.error {
            if error.message.to_lowercase().contains("not found") {
                return Ok(None);
            }
            return Err(RelayError::Infrastructure(format!("asset rpc: {}", error.message)));
        }
        Ok(parsed.result.and_then(DasAsset::into_metadata))
    }
}

/// Tries each source in order; the first hit wins.
#[derive(Debug, Clone, Default)]
pub struct ChainedMetadata {
    sources: Vec<Arc<dyn MetadataLookup>>,
}

impl ChainedMetadata {
    /// Creates an empty chain, which finds nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source.
    #[must_use]
    pub fn with(mut self, source: Arc<dyn MetadataLookup>) -> Self {
        self.sources.push(source);
        self
    }

    /// Returns `true` if no source is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl MetadataLookup for ChainedMetadata {
    async fn lookup(&self, item_id: &str) -> Result<Option<ItemMetadata>, RelayError> {
        for source in &self.sources {
            if let Some(found) = source.lookup(item_id).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
