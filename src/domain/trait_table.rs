//! Read-only trait reference data.
//!
//! Maps each trait type to its known values, their population counts, and
//! the optional notify group subscribed to that value. Loaded once at
//! startup and shared immutably across requests.

use std::collections::HashMap;

use serde::Deserialize;

/// Reference data bundled with the binary, used when no
/// `TRAIT_TABLE_PATH` is configured.
const EMBEDDED_TRAITS: &str = include_str!("../../data/traits.json");

/// One known value of a trait type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TraitValue {
    /// Trait value, e.g. `"Crown"`.
    pub value: String,
    /// Number of items in the collection carrying this value.
    #[serde(rename = "count")]
    pub population_count: u32,
    /// Recipient group to address when an item with this value trades.
    /// Empty strings in source data mean "none".
    #[serde(default, rename = "role")]
    pub notify_group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TraitEntry {
    trait_type: String,
    values: Vec<TraitValue>,
}

#[derive(Debug, Deserialize)]
struct TraitFile {
    items: Vec<TraitEntry>,
}

/// Immutable `trait type → values` table.
#[derive(Debug, Clone, Default)]
pub struct TraitTable {
    traits: HashMap<String, Vec<TraitValue>>,
}

impl TraitTable {
    /// Parses the `{"items": [{"trait_type", "values": [...]}]}` format.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: TraitFile = serde_json::from_str(json)?;
        let traits = file
            .items
            .into_iter()
            .map(|entry| (entry.trait_type, entry.values))
            .collect();
        Ok(Self { traits })
    }

    /// Returns the table bundled with the binary.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the bundled data is malformed.
    pub fn embedded() -> Result<Self, serde_json::Error> {
        Self::from_json(EMBEDDED_TRAITS)
    }

    /// Returns the notify group for `(trait_type, value)`, if one is set.
    #[must_use]
    pub fn notify_group(&self, trait_type: &str, value: &str) -> Option<&str> {
        self.lookup(trait_type, value)
            .and_then(|v| v.notify_group.as_deref())
            .filter(|group| !group.is_empty())
    }

    /// Number of trait types in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    /// Returns `true` if the table holds no trait types.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    fn lookup(&self, trait_type: &str, value: &str) -> Option<&TraitValue> {
        self.traits
            .get(trait_type)
            .and_then(|values| values.iter().find(|v| v.value == value))
    }
}
