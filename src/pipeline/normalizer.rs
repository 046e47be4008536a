//! Upstream record normalization.
//!
//! Maps heterogeneous upstream records into [`Event`]s. Two feed shapes
//! are recognized:
//!
//! - the canonical record (`eventId`, `kind`, `itemId`, `price: {raw,
//!   decimals}`, ...), and
//! - the marketplace activity record (`signature`, `type`, `tokenMint`,
//!   `priceInfo.solPrice`, `blockTime`, ...).
//!
//! Webhook deliveries are normalized from the parsed-transaction shape via
//! [`Normalizer::normalize_parsed`]. Normalization is pure.

use chrono::DateTime;
use serde::Deserialize;

use crate::domain::{Counterparties, Event, EventId, EventKind, Price, PriceError};
use crate::error::RelayError;
use crate::upstream::transaction::{ParsedAction, ParsedTransaction};

/// Parsed action kinds accepted from the webhook path.
pub const SALE_ACTION_TYPES: [&str; 2] = ["COMPRESSED_NFT_SALE", "COMPRESSED_NFT_TAKE_BID"];

/// Known marketplace program ids and the source tag they map to.
const PROGRAM_SOURCES: [(&str, &str); 2] = [
    ("M3mxk5W2tt27WGT7THox7PmgRDp4m6NEhL5xvxrBfS1", "magic_eden_v3"),
    ("TCMPhJdwDryooaGtiocG1u3xcYbRpiJzb283XfCZsDp", "tensor_cnft"),
];

/// Why a record could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    /// The record matches neither known feed shape.
    #[error("record {index}: unrecognized shape ({reason})")]
    UnrecognizedShape {
        /// Position in the batch.
        index: usize,
        /// Deserializer message.
        reason: String,
    },
    /// A required field is absent or empty.
    #[error("record {index}: missing required field `{field}`")]
    MissingField {
        /// Position in the batch.
        index: usize,
        /// Field name.
        field: &'static str,
    },
    /// `kind` is not a sale or listing.
    #[error("record {index}: unknown kind {kind:?}")]
    UnknownKind {
        /// Position in the batch.
        index: usize,
        /// Offending value.
        kind: String,
    },
    /// Price could not be resolved to a fixed-point value.
    #[error("record {index}: invalid price: {source}")]
    InvalidPrice {
        /// Position in the batch.
        index: usize,
        /// Underlying price error.
        source: PriceError,
    },
    /// Timestamp could not be parsed.
    #[error("record {index}: invalid timestamp {value:?}")]
    InvalidTimestamp {
        /// Position in the batch.
        index: usize,
        /// Offending value.
        value: String,
    },
}

/// Integer amount that may arrive as a JSON number or string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Int(u64),
    Text(String),
}

impl RawAmount {
    fn to_u128(&self) -> Result<u128, PriceError> {
        match self {
            Self::Int(n) => Ok(u128::from(*n)),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| PriceError::Unparseable(s.clone())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FixedPrice {
    #[serde(alias = "rawAmount")]
    raw: RawAmount,
    #[serde(default)]
    decimals: Option<u32>,
}

/// Price as carried by a canonical record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Fixed(FixedPrice),
    Number(serde_json::Number),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalRecord {
    event_id: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    collection_id: Option<String>,
    #[serde(default)]
    seller: Option<String>,
    #[serde(default)]
    buyer: Option<String>,
    #[serde(default)]
    price: Option<RawPrice>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default, alias = "marketplaceSource")]
    source: Option<String>,
    #[serde(default, alias = "imageUri")]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolPrice {
    raw_amount: RawAmount,
    #[serde(default)]
    decimals: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceInfo {
    #[serde(default)]
    sol_price: Option<SolPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityRecord {
    signature: String,
    #[serde(default, rename = "type")]
    activity_type: Option<String>,
    #[serde(default)]
    token_mint: Option<String>,
    #[serde(default)]
    collection: Option<String>,
    #[serde(default)]
    collection_symbol: Option<String>,
    #[serde(default)]
    seller: Option<String>,
    #[serde(default)]
    buyer: Option<String>,
    #[serde(default)]
    price: Option<serde_json::Number>,
    #[serde(default)]
    price_info: Option<PriceInfo>,
    #[serde(default)]
    block_time: Option<i64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Canonical(CanonicalRecord),
    Activity(ActivityRecord),
}

/// Result of normalizing a whole batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Events in feed order.
    pub events: Vec<Event>,
    /// Records dropped as out of scope (other activity types, other
    /// collections).
    pub filtered: usize,
}

/// Pure upstream-record → [`Event`] mapper.
#[derive(Debug, Clone)]
pub struct Normalizer {
    collection_id: String,
    native_decimals: u32,
}

impl Normalizer {
    /// Creates a normalizer for one collection.
    ///
    /// `native_decimals` is the collection-wide decimal shift applied only
    /// when a record reports a raw amount without its own `decimals`.
    #[must_use]
    pub fn new(collection_id: impl Into<String>, native_decimals: u32) -> Self {
        Self {
            collection_id: collection_id.into(),
            native_decimals,
        }
    }

    /// Normalizes every record of a batch.
    ///
    /// Records of out-of-scope activity types or of other collections are
    /// counted in [`NormalizedBatch::filtered`].
    ///
    /// # Errors
    ///
    /// Returns the first [`NormalizationError`]; no partial batch is
    /// produced.
    pub fn normalize_batch(
        &self,
        records: &[serde_json::Value],
    ) -> Result<NormalizedBatch, NormalizationError> {
        let mut batch = NormalizedBatch::default();
        for (index, record) in records.iter().enumerate() {
            match self.normalize(index, record)? {
                Some(event) if event.collection_id == self.collection_id => {
                    batch.events.push(event);
                }
                Some(event) => {
                    tracing::debug!(
                        event_id = %event.event_id,
                        collection = %event.collection_id,
                        "filtered event from another collection"
                    );
                    batch.filtered += 1;
                }
                None => batch.filtered += 1,
            }
        }
        Ok(batch)
    }

    /// Normalizes a single record. `Ok(None)` means the record is a valid
    /// activity of a type the relay does not announce (bids, delistings).
    ///
    /// # Errors
    ///
    /// Returns [`NormalizationError`] if required fields are missing or
    /// malformed.
    pub fn normalize(
        &self,
        index: usize,
        record: &serde_json::Value,
    ) -> Result<Option<Event>, NormalizationError> {
        let raw = RawRecord::deserialize(record).map_err(|e| {
            NormalizationError::UnrecognizedShape {
                index,
                reason: e.to_string(),
            }
        })?;
        match raw {
            RawRecord::Canonical(r) => self.from_canonical(index, r).map(Some),
            RawRecord::Activity(r) => self.from_activity(index, r),
        }
    }

    /// Normalizes a webhook delivery from its parsed transaction.
    ///
    /// Only the first action is considered, and only the sale kinds in
    /// [`SALE_ACTION_TYPES`] are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UnsupportedAction`] for any other action, and
    /// [`RelayError::Normalization`] if the sale lacks required fields.
    pub fn normalize_parsed(
        &self,
        signature: &str,
        parsed: &ParsedTransaction,
    ) -> Result<Event, RelayError> {
        let action = parsed
            .result
            .actions
            .first()
            .ok_or_else(|| RelayError::UnsupportedAction("no actions in transaction".to_string()))?;
        if !SALE_ACTION_TYPES.contains(&action.action_type.as_str()) {
            return Err(RelayError::UnsupportedAction(action.action_type.clone()));
        }
        let info = action
            .info
            .as_ref()
            .ok_or(NormalizationError::MissingField { index: 0, field: "info" })?;

        let item_id = required(0, "nft_address", info.nft_address.clone())?;
        let seller = required(0, "seller", info.seller.clone())?;
        let buyer = required(0, "buyer", info.buyer.clone())?;
        let price = info
            .price
            .as_ref()
            .ok_or(NormalizationError::MissingField { index: 0, field: "price" })
            .and_then(|n| price_from_number(0, n))?;
        let timestamp_text = required(0, "timestamp", parsed.result.timestamp.clone())?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_text)
            .map_err(|_| NormalizationError::InvalidTimestamp {
                index: 0,
                value: timestamp_text.clone(),
            })?
            .timestamp();

        Ok(Event {
            event_id: EventId::new(signature),
            kind: EventKind::Sale,
            item_id,
            collection_id: self.collection_id.clone(),
            timestamp,
            price,
            counterparties: Counterparties {
                buyer: Some(buyer),
                seller,
            },
            marketplace_source: source_of(action),
            image_uri: None,
        })
    }

    fn from_canonical(&self, index: usize, r: CanonicalRecord) -> Result<Event, NormalizationError> {
        let event_id = required(index, "eventId", Some(r.event_id))?;
        let kind_text = required(index, "kind", r.kind)?;
        let kind = parse_kind(&kind_text).ok_or(NormalizationError::UnknownKind {
            index,
            kind: kind_text,
        })?;
        let item_id = required(index, "itemId", r.item_id)?;
        let seller = required(index, "seller", r.seller)?;
        let buyer = buyer_for(index, kind, r.buyer)?;
        let price = match r.price {
            Some(RawPrice::Fixed(fixed)) => self.price_from_raw(index, &fixed.raw, fixed.decimals)?,
            Some(RawPrice::Number(n)) => price_from_number(index, &n)?,
            Some(RawPrice::Text(t)) => Price::parse(&t)
                .map_err(|source| NormalizationError::InvalidPrice { index, source })?,
            None => return Err(NormalizationError::MissingField { index, field: "price" }),
        };
        let timestamp = r
            .timestamp
            .ok_or(NormalizationError::MissingField { index, field: "timestamp" })?;

        Ok(Event {
            event_id: EventId::new(event_id),
            kind,
            item_id,
            collection_id: non_empty(r.collection_id).unwrap_or_else(|| self.collection_id.clone()),
            timestamp,
            price,
            counterparties: Counterparties { buyer, seller },
            marketplace_source: non_empty(r.source).unwrap_or_default(),
            image_uri: non_empty(r.image),
        })
    }

    fn from_activity(&self, index: usize, r: ActivityRecord) -> Result<Option<Event>, NormalizationError> {
        let event_id = required(index, "signature", Some(r.signature))?;
        let activity_type = required(index, "type", r.activity_type)?;
        let kind = match activity_type.as_str() {
            "buyNow" => EventKind::Sale,
            "list" => EventKind::Listing,
            other => {
                tracing::trace!(%event_id, activity_type = other, "activity type not relayed");
                return Ok(None);
            }
        };
        let item_id = required(index, "tokenMint", r.token_mint)?;
        let seller = required(index, "seller", r.seller)?;
        let buyer = buyer_for(index, kind, r.buyer)?;

        let sol_price = r.price_info.and_then(|p| p.sol_price);
        let price = match (sol_price, r.price) {
            (Some(sol), _) => self.price_from_raw(index, &sol.raw_amount, sol.decimals)?,
            (None, Some(n)) => price_from_number(index, &n)?,
            (None, None) => return Err(NormalizationError::MissingField { index, field: "price" }),
        };
        let timestamp = r
            .block_time
            .ok_or(NormalizationError::MissingField { index, field: "blockTime" })?;

        Ok(Some(Event {
            event_id: EventId::new(event_id),
            kind,
            item_id,
            collection_id: non_empty(r.collection)
                .or_else(|| non_empty(r.collection_symbol))
                .unwrap_or_else(|| self.collection_id.clone()),
            timestamp,
            price,
            counterparties: Counterparties { buyer, seller },
            marketplace_source: non_empty(r.source).unwrap_or_default(),
            image_uri: non_empty(r.image),
        }))
    }

    /// Uses the record's own decimal shift when present, the configured
    /// native shift otherwise.
    fn price_from_raw(
        &self,
        index: usize,
        raw: &RawAmount,
        decimals: Option<u32>,
    ) -> Result<Price, NormalizationError> {
        let shift = decimals.unwrap_or(self.native_decimals);
        raw.to_u128()
            .and_then(|amount| Price::from_raw(amount, shift))
            .map_err(|source| NormalizationError::InvalidPrice { index, source })
    }
}

/// Converts an already-shifted JSON number without going through `f64`.
fn price_from_number(index: usize, n: &serde_json::Number) -> Result<Price, NormalizationError> {
    Price::parse(&n.to_string()).map_err(|source| NormalizationError::InvalidPrice { index, source })
}

fn parse_kind(text: &str) -> Option<EventKind> {
    match text.to_ascii_lowercase().as_str() {
        "sale" | "buynow" => Some(EventKind::Sale),
        "listing" | "list" => Some(EventKind::Listing),
        _ => None,
    }
}

/// Sales must name a buyer; listings never carry one.
fn buyer_for(
    index: usize,
    kind: EventKind,
    buyer: Option<String>,
) -> Result<Option<String>, NormalizationError> {
    match kind {
        EventKind::Sale => required(index, "buyer", buyer).map(Some),
        EventKind::Listing => Ok(None),
    }
}

fn required(
    index: usize,
    field: &'static str,
    value: Option<String>,
) -> Result<String, NormalizationError> {
    non_empty(value).ok_or(NormalizationError::MissingField { index, field })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Source tag of a parsed action: protocol name, else a known program id,
/// else the raw program address.
fn source_of(action: &ParsedAction) -> String {
    let Some(protocol) = action.source_protocol.as_ref() else {
        return String::new();
    };
    if let Some(name) = protocol.name.as_ref().filter(|n| !n.is_empty()) {
        return name.clone();
    }
    PROGRAM_SOURCES
        .iter()
        .find(|(program, _)| *program == protocol.address)
        .map_or_else(|| protocol.address.clone(), |(_, tag)| (*tag).to_string())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new("saga_monkes", 9)
    }

    #[test]
    fn canonical_sale_with_per_event_decimals() {
        let record = json!({
            "eventId": "s1", "kind": "Sale", "itemId": "it1", "seller": "A", "buyer": "B",
            "price": {"raw": 5_000_000_000_u64, "decimals": 9}, "timestamp": 1_700_000_000
        });
        let Ok(Some(event)) = normalizer().normalize(0, &record) else {
            panic!("expected event");
        };
        assert_eq!(event.event_id.as_str(), "s1");
        assert_eq!(event.kind, EventKind::Sale);
        assert_eq!(event.price.to_string(), "5.00");
        assert_eq!(event.counterparties.buyer.as_deref(), Some("B"));
        assert_eq!(event.collection_id, "saga_monkes");
    }

    #[test]
    fn per_event_decimals_override_native() {
        let record = json!({
            "eventId": "s1", "kind": "sale", "itemId": "it1", "seller": "A", "buyer": "B",
            "price": {"raw": "2500000", "decimals": 6}, "timestamp": 1
        });
        let Ok(Some(event)) = normalizer().normalize(0, &record) else {
            panic!("expected event");
        };
        assert_eq!(event.price.decimals(), 6);
        assert_eq!(event.price.to_string(), "2.50");
    }

    #[test]
    fn sale_without_buyer_is_rejected() {
        let record = json!({
            "eventId": "s1", "kind": "Sale", "itemId": "it1", "seller": "A",
            "price": {"raw": 1, "decimals": 9}, "timestamp": 1
        });
        assert_eq!(
            normalizer().normalize(3, &record),
            Err(NormalizationError::MissingField { index: 3, field: "buyer" })
        );
    }

    #[test]
    fn listing_drops_buyer() {
        let record = json!({
            "eventId": "l1", "kind": "Listing", "itemId": "it1", "seller": "A", "buyer": "X",
            "price": 1.5, "timestamp": 1
        });
        let Ok(Some(event)) = normalizer().normalize(0, &record) else {
            panic!("expected event");
        };
        assert!(event.counterparties.buyer.is_none());
        assert_eq!(event.price.to_string(), "1.50");
    }

    #[test]
    fn unknown_canonical_kind_is_error() {
        let record = json!({
            "eventId": "x", "kind": "Bid", "itemId": "it1", "seller": "A",
            "price": 1, "timestamp": 1
        });
        assert!(matches!(
            normalizer().normalize(0, &record),
            Err(NormalizationError::UnknownKind { .. })
        ));
    }

    #[test]
    fn activity_sale_uses_price_info() {
        let record = json!({
            "signature": "sig1", "type": "buyNow", "tokenMint": "mint1",
            "collection": "saga_monkes", "seller": "S", "buyer": "B", "price": 3.1,
            "priceInfo": {"solPrice": {"rawAmount": "3100000000", "address": "So111", "decimals": 9}},
            "blockTime": 1_717_000_000, "source": "tensor_v2", "image": "https://img/42.png"
        });
        let Ok(Some(event)) = normalizer().normalize(0, &record) else {
            panic!("expected event");
        };
        assert_eq!(event.event_id.as_str(), "sig1");
        assert_eq!(event.price.raw_amount(), 3_100_000_000);
        assert_eq!(event.price.decimals(), 9);
        assert_eq!(event.image_uri.as_deref(), Some("https://img/42.png"));
    }

    #[test]
    fn activity_raw_amount_without_decimals_uses_native_shift() {
        let record = json!({
            "signature": "sig2", "type": "list", "tokenMint": "mint1", "seller": "S",
            "priceInfo": {"solPrice": {"rawAmount": 1_000_000_000_u64}}, "blockTime": 1
        });
        let Ok(Some(event)) = normalizer().normalize(0, &record) else {
            panic!("expected event");
        };
        assert_eq!(event.kind, EventKind::Listing);
        assert_eq!(event.price.to_string(), "1.00");
    }

    #[test]
    fn activity_of_other_type_is_filtered() {
        let record = json!({"signature": "sig3", "type": "bid", "tokenMint": "m"});
        assert_eq!(normalizer().normalize(0, &record), Ok(None));
    }

    #[test]
    fn unrecognized_shape_is_error() {
        assert!(matches!(
            normalizer().normalize(0, &json!({"foo": 1})),
            Err(NormalizationError::UnrecognizedShape { .. })
        ));
        assert!(matches!(
            normalizer().normalize(0, &json!("text")),
            Err(NormalizationError::UnrecognizedShape { .. })
        ));
    }

    #[test]
    fn batch_aborts_on_first_bad_record() {
        let records = vec![
            json!({"signature": "ok", "type": "list", "tokenMint": "m", "seller": "S",
                   "price": 1, "blockTime": 1}),
            json!({"signature": "bad", "type": "list", "seller": "S", "price": 1, "blockTime": 1}),
        ];
        assert_eq!(
            normalizer().normalize_batch(&records).map(|b| b.events.len()),
            Err(NormalizationError::MissingField { index: 1, field: "tokenMint" })
        );
    }

    #[test]
    fn batch_filters_other_collections_and_types() {
        let records = vec![
            json!({"signature": "a", "type": "list", "tokenMint": "m", "seller": "S",
                   "price": 1, "blockTime": 1, "collection": "other"}),
            json!({"signature": "b", "type": "delist", "tokenMint": "m"}),
            json!({"signature": "c", "type": "list", "tokenMint": "m", "seller": "S",
                   "price": 1, "blockTime": 1}),
        ];
        let Ok(batch) = normalizer().normalize_batch(&records) else {
            panic!("batch should normalize");
        };
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.filtered, 2);
    }
}
