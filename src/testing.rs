//! Shared fixtures for unit tests.

use crate::domain::{Counterparties, Event, EventId, EventKind, Price};

pub(crate) const COLLECTION: &str = "saga_monkes";

fn lamports(amount: u64) -> Price {
    Price::from_raw(u128::from(amount), 9).unwrap_or_default()
}

pub(crate) fn sale(id: &str, item: &str, seller: &str, buyer: &str, amount: u64) -> Event {
    Event {
        event_id: EventId::new(id),
        kind: EventKind::Sale,
        item_id: item.to_string(),
        collection_id: COLLECTION.to_string(),
        timestamp: 1_700_000_000,
        price: lamports(amount),
        counterparties: Counterparties {
            buyer: Some(buyer.to_string()),
            seller: seller.to_string(),
        },
        marketplace_source: "tensor_v2".to_string(),
        image_uri: None,
    }
}

pub(crate) fn listing(id: &str, item: &str, seller: &str, amount: u64) -> Event {
    Event {
        event_id: EventId::new(id),
        kind: EventKind::Listing,
        item_id: item.to_string(),
        collection_id: COLLECTION.to_string(),
        timestamp: 1_700_000_000,
        price: lamports(amount),
        counterparties: Counterparties {
            buyer: None,
            seller: seller.to_string(),
        },
        marketplace_source: "magic_eden_v2".to_string(),
        image_uri: None,
    }
}
