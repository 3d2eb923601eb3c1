//! Item ledger: one persisted row per enclosure address.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteItemLedger;
pub use store::{ItemLedger, LedgerError, UpdateOutcome};
pub use types::{DiscoveredEntry, ItemId, LedgerItem};
