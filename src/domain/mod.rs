//! Domain layer: events, reference data, ledger entries and payloads.
//!
//! Everything in here is plain data. I/O lives in [`crate::ledger`],
//! [`crate::upstream`] and [`crate::sink`]; the pipeline stages that
//! transform these types live in [`crate::pipeline`].

pub mod event;
pub mod event_id;
pub mod item_metadata;
pub mod ledger_entry;
pub mod notification;
pub mod trait_table;

pub use event::{Counterparties, Event, EventKind, Marketplace, Price, PriceError};
pub use event_id::EventId;
pub use item_metadata::{Attribute, ItemMetadata};
pub use ledger_entry::LedgerEntry;
pub use notification::{Footer, LISTING_COLOR, NotificationPayload, PayloadField, SALE_COLOR};
pub use trait_table::{TraitTable, TraitValue};
