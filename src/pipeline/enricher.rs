//! Event enrichment: joins an event with item metadata and trait-based
//! notify groups, and lays out the notification.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{
    Attribute, Event, EventKind, Footer, ItemMetadata, LISTING_COLOR, Marketplace,
    NotificationPayload, PayloadField, SALE_COLOR, TraitTable,
};
use crate::error::RelayError;
use crate::upstream::MetadataLookup;

/// Static presentation settings.
#[derive(Debug, Clone)]
pub struct Presentation {
    /// Collection label used in fallback names and summary titles.
    pub collection_label: String,
    /// Footer text of sale notifications.
    pub footer_text: String,
    /// Footer icon of all notifications.
    pub footer_icon_url: Option<String>,
}

impl Presentation {
    pub(crate) fn footer(&self, text: impl Into<String>) -> Footer {
        Footer {
            text: text.into(),
            icon_url: self.footer_icon_url.clone(),
        }
    }
}

/// A payload ready for dispatch plus what the ledger keeps of it.
#[derive(Debug, Clone)]
pub struct Enriched {
    /// The event with its image filled from metadata when it had none.
    pub event: Event,
    /// Resolved display name.
    pub item_name: String,
    /// The formatted notification.
    pub payload: NotificationPayload,
}

/// Result of [`Enricher::enrich`].
#[derive(Debug, Clone)]
pub enum Enrichment {
    /// Proceed with this payload.
    Ready(Box<Enriched>),
    /// Listing without metadata; drop silently, do not record.
    Skipped,
}

/// Derives a display name when metadata is unavailable: a numbered image
/// file (`.../1234.png`) gives `"{label} #1234"`.
#[must_use]
pub fn display_name(label: &str, image_uri: Option<&str>) -> String {
    image_uri
        .and_then(|uri| {
            let path = uri.split(['?', '#']).next().unwrap_or(uri);
            let stem = path.strip_suffix(".png")?;
            let digits_start = stem
                .char_indices()
                .rev()
                .take_while(|(_, c)| c.is_ascii_digit())
                .last()
                .map(|(i, _)| i)?;
            stem.get(digits_start..).map(|n| format!("{label} #{n}"))
        })
        .unwrap_or_else(|| format!("{label} item"))
}

/// `<@&group>` mentions, first occurrence order, no repeats.
fn recipient_groups(traits: &TraitTable, attributes: &[Attribute]) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for attr in attributes {
        if let Some(group) = traits.notify_group(&attr.trait_type, &attr.value) {
            if !groups.iter().any(|g| g == group) {
                groups.push(group.to_string());
            }
        }
    }
    groups
}

fn attribute_listing(attributes: &[Attribute]) -> String {
    attributes
        .iter()
        .map(|a| format!("**{}**: {}", a.trait_type, a.value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Joins events with metadata and trait reference data.
#[derive(Debug, Clone)]
pub struct Enricher {
    metadata: Arc<dyn MetadataLookup>,
    traits: Arc<TraitTable>,
    presentation: Presentation,
}

impl Enricher {
    /// Creates an enricher.
    #[must_use]
    pub fn new(
        metadata: Arc<dyn MetadataLookup>,
        traits: Arc<TraitTable>,
        presentation: Presentation,
    ) -> Self {
        Self {
            metadata,
            traits,
            presentation,
        }
    }

    /// Enriches one event.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Infrastructure`] if the metadata source is
    /// unreachable. A plain miss is not an error.
    pub async fn enrich(&self, event: &Event) -> Result<Enrichment, RelayError> {
        let metadata = self.metadata.lookup(&event.item_id).await?;
        if metadata.is_none() && event.kind == EventKind::Listing {
            tracing::info!(
                event_id = %event.event_id,
                item_id = %event.item_id,
                "no metadata for listed item, skipping"
            );
            return Ok(Enrichment::Skipped);
        }
        Ok(Enrichment::Ready(Box::new(self.build(event, metadata.as_ref()))))
    }

    fn build(&self, event: &Event, metadata: Option<&ItemMetadata>) -> Enriched {
        let mut event = event.clone();
        if event.image_uri.is_none() {
            event.image_uri = metadata.and_then(|m| m.image_uri.clone());
        }
        let item_name = metadata.map_or_else(
            || display_name(&self.presentation.collection_label, event.image_uri.as_deref()),
            |m| m.name.clone(),
        );
        let attributes = metadata.map(|m| m.attributes.as_slice()).unwrap_or_default();
        let marketplace = event.marketplace();
        let groups = recipient_groups(&self.traits, attributes);
        let date = event
            .occurred_at()
            .unwrap_or_else(Utc::now)
            .format("%-m/%-d/%Y")
            .to_string();

        let verb = match event.kind {
            EventKind::Sale => "has sold on",
            EventKind::Listing => "has been listed on",
        };
        let lead = (!groups.is_empty()).then(|| {
            let mentions = groups
                .iter()
                .map(|g| format!("<@&{g}>"))
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "{mentions}, your followed trait {verb} {}",
                marketplace.display_name()
            )
        });

        let payload = match event.kind {
            EventKind::Sale => self.sale_payload(&event, &item_name, &date, attributes),
            EventKind::Listing => self.listing_payload(&event, &item_name, &date, attributes, marketplace),
        };
        let payload = NotificationPayload {
            lead,
            recipient_groups: groups,
            ..payload
        };

        Enriched {
            event,
            item_name,
            payload,
        }
    }

    fn sale_payload(
        &self,
        event: &Event,
        item_name: &str,
        date: &str,
        attributes: &[Attribute],
    ) -> NotificationPayload {
        let buyer = event.counterparties.buyer.as_deref().unwrap_or("unknown");
        let mut fields = vec![
            PayloadField::new(":moneybag:  Sale Price", format!("**{} SOL**", event.price), true),
            PayloadField::new(":date:  Sale Date", date, true),
            PayloadField::new("Buyer", buyer, false),
            PayloadField::new("Seller", event.counterparties.seller.as_str(), false),
        ];
        if !attributes.is_empty() {
            fields.push(PayloadField::new("Attributes", attribute_listing(attributes), false));
        }
        NotificationPayload {
            event_id: Some(event.event_id.clone()),
            lead: None,
            title: format!("{item_name} has sold!"),
            url: Some(format!("https://solscan.io/token/{}", event.item_id)),
            color: SALE_COLOR,
            fields,
            image_uri: event.image_uri.clone(),
            footer: self.presentation.footer(self.presentation.footer_text.as_str()),
            recipient_groups: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    fn listing_payload(
        &self,
        event: &Event,
        item_name: &str,
        date: &str,
        attributes: &[Attribute],
        marketplace: Marketplace,
    ) -> NotificationPayload {
        NotificationPayload {
            event_id: Some(event.event_id.clone()),
            lead: None,
            title: format!("{item_name} has been listed!"),
            url: Some(format!("https://magiceden.io/item-details/{}", event.item_id)),
            color: LISTING_COLOR,
            fields: vec![
                PayloadField::new(":moneybag: New Price", format!("{} ◎", event.price), true),
                PayloadField::new(":date: Change Date", date, true),
                PayloadField::new("Seller", event.counterparties.seller.as_str(), false),
                PayloadField::new("Attributes", attribute_listing(attributes), false),
            ],
            image_uri: event.image_uri.clone(),
            footer: self
                .presentation
                .footer(format!("Listed on {}", marketplace.display_name())),
            recipient_groups: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}
