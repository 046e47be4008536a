//! Off-chain item metadata.
//!
//! Snapshots store attributes either as an ordered JSON object
//! (`{"Fur": "Solana"}`) or as the Metaplex-style array
//! (`[{"trait_type": "Fur", "value": "Solana"}]`). Both are read into an
//! ordered list so notifications preserve the item's attribute order.

use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// One `(trait type, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Trait category, e.g. `"Fur"`.
    pub trait_type: String,
    /// Trait value, e.g. `"Solana"`.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute pair.
    #[must_use]
    pub fn new(trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }
}

/// Descriptive metadata for one item. Immutable once looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Display name, e.g. `"Saga Monke #1234"`.
    pub name: String,
    /// Image URI.
    #[serde(default, alias = "image")]
    pub image_uri: Option<String>,
    /// Attributes in the item's own order.
    #[serde(default, deserialize_with = "deserialize_attributes")]
    pub attributes: Vec<Attribute>,
}

/// Renders a JSON scalar as trait text. Numeric traits (`"Wave": 2`) occur
/// in the wild.
fn scalar_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct RawAttribute {
    trait_type: String,
    value: serde_json::Value,
}

struct AttributesVisitor;

impl<'de> Visitor<'de> for AttributesVisitor {
    type Value = Vec<Attribute>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an attribute object or an array of {trait_type, value}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((trait_type, value)) = map.next_entry::<String, serde_json::Value>()? {
            out.push(Attribute::new(trait_type, scalar_to_string(value)));
        }
        Ok(out)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(raw) = seq.next_element::<RawAttribute>()? {
            out.push(Attribute::new(raw.trait_type, scalar_to_string(raw.value)));
        }
        Ok(out)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }
}

/// Deserializes attributes from either supported shape, keeping order.
///
/// # Errors
///
/// Returns a deserialization error for any other shape.
pub fn deserialize_attributes<'de, D>(deserializer: D) -> Result<Vec<Attribute>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(AttributesVisitor)
}
