//! Canonical marketplace event.
//!
//! Every upstream shape (polled activity page, webhook-parsed transaction,
//! test fixture) is normalized into an [`Event`] before it reaches the
//! deduplicator. Prices are carried as [`Price`], a fixed-point value whose
//! mantissa and scale are exactly the upstream raw amount and decimal shift.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::EventId;

/// Kind of marketplace occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An item changed hands.
    Sale,
    /// An item was put up for sale.
    Listing,
}

impl EventKind {
    /// Returns the kind as a static string slice, as stored in the ledger.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Listing => "listing",
        }
    }

    /// Parses the ledger representation produced by [`EventKind::as_str`].
    #[must_use]
    pub fn from_ledger_str(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(Self::Sale),
            "listing" => Some(Self::Listing),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of marketplaces a free-text source tag is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Marketplace {
    /// Magic Eden (any program version).
    MagicEden,
    /// Tensor (any program version).
    Tensor,
    /// Anything else.
    Other,
}

impl Marketplace {
    /// Classifies an upstream source tag by case-insensitive substring.
    ///
    /// Patterns are tried in priority order and the first match wins:
    /// `"tensor"`, then `"magic"`, else [`Marketplace::Other`].
    #[must_use]
    pub fn classify(source: &str) -> Self {
        let source = source.to_lowercase();
        if source.contains("tensor") {
            Self::Tensor
        } else if source.contains("magic") {
            Self::MagicEden
        } else {
            Self::Other
        }
    }

    /// Human-readable marketplace name used in notifications.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::MagicEden => "MagicEden",
            Self::Tensor => "Tensor",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Errors constructing a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The decimal shift exceeds what a fixed-point price can carry.
    #[error("decimal shift {0} exceeds maximum of {max}", max = Price::MAX_DECIMALS)]
    ShiftTooLarge(u32),
    /// The raw amount does not fit the fixed-point mantissa.
    #[error("raw amount {0} out of range")]
    AmountOutOfRange(String),
    /// Prices are never negative.
    #[error("negative price {0}")]
    Negative(Decimal),
    /// A textual price could not be parsed.
    #[error("unparseable price {0:?}")]
    Unparseable(String),
}

/// Price in the collection's native currency unit.
///
/// Stored as a [`Decimal`], i.e. an integer mantissa plus a decimal scale,
/// which is exactly the `(rawAmount, decimalShift)` pair the upstream
/// reports. Conversion from raw amount happens once, at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Largest decimal shift representable.
    pub const MAX_DECIMALS: u32 = 28;

    /// Builds a price from an integer amount in the smallest unit and its
    /// decimal shift (e.g. `5_000_000_000` lamports with shift `9`).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if the shift exceeds [`Price::MAX_DECIMALS`]
    /// or the amount does not fit the 96-bit mantissa.
    pub fn from_raw(raw_amount: u128, decimals: u32) -> Result<Self, PriceError> {
        if decimals > Self::MAX_DECIMALS {
            return Err(PriceError::ShiftTooLarge(decimals));
        }
        let raw = i128::try_from(raw_amount)
            .map_err(|_| PriceError::AmountOutOfRange(raw_amount.to_string()))?;
        Decimal::try_from_i128_with_scale(raw, decimals)
            .map(Self)
            .map_err(|_| PriceError::AmountOutOfRange(raw_amount.to_string()))
    }

    /// Builds a price from an already-shifted decimal value.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative values.
    pub fn from_decimal(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Parses a textual decimal such as `"5.25"` or `"1e-3"`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if the text is not a non-negative decimal.
    pub fn parse(text: &str) -> Result<Self, PriceError> {
        let amount = text
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(text))
            .map_err(|_| PriceError::Unparseable(text.to_string()))?;
        Self::from_decimal(amount)
    }

    /// Returns the decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns the raw integer amount in the smallest unit.
    #[must_use]
    pub fn raw_amount(&self) -> i128 {
        self.0.mantissa()
    }

    /// Returns the decimal shift applied to [`Price::raw_amount`].
    #[must_use]
    pub fn decimals(&self) -> u32 {
        self.0.scale()
    }
}

impl fmt::Display for Price {
    /// Formats with two fractional digits, the precision shown in
    /// notifications.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}",
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        )
    }
}

/// Parties to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparties {
    /// Buyer wallet. Present iff the event is a sale.
    pub buyer: Option<String>,
    /// Seller wallet. Always present.
    pub seller: String,
}

/// One normalized marketplace occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Primary dedup key.
    pub event_id: EventId,
    /// Sale or listing.
    pub kind: EventKind,
    /// On-chain item (mint) address.
    pub item_id: String,
    /// Collection the item belongs to.
    pub collection_id: String,
    /// Unix seconds of occurrence.
    pub timestamp: i64,
    /// Price in native currency units.
    pub price: Price,
    /// Buyer and seller.
    pub counterparties: Counterparties,
    /// Free-text upstream source tag (e.g. `"tensor_v2"`).
    pub marketplace_source: String,
    /// Item image, filled by enrichment when absent.
    pub image_uri: Option<String>,
}

impl Event {
    /// Classifies [`Event::marketplace_source`].
    #[must_use]
    pub fn marketplace(&self) -> Marketplace {
        Marketplace::classify(&self.marketplace_source)
    }

    /// Time of occurrence, if the timestamp is representable.
    #[must_use]
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}
