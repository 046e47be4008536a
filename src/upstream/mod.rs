//! Upstream collaborators: the activity feed, the parsed-transaction
//! service and item metadata sources.

pub mod activity_feed;
pub mod metadata;
pub mod transaction;

pub use activity_feed::{ActivityFeed, MarketplaceFeed};
pub use metadata::{ChainedMetadata, DasMetadata, MetadataLookup, SnapshotMetadata};
pub use transaction::{HttpTransactionParser, ParsedTransaction, TransactionParser};
