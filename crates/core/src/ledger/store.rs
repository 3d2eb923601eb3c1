//! Ledger storage trait and error type.

use thiserror::Error;

use crate::status::StatusId;

use super::{DiscoveredEntry, LedgerItem};

/// Errors from the item table.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Item store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to read item: {0}")]
    StoreReadFailed(String),

    #[error("Failed to write item: {0}")]
    StoreWriteFailed(String),

    /// A row for this address already exists (concurrent first sighting).
    #[error("Item already exists for address: {0}")]
    AlreadyExists(String),

    #[error("No item for address: {0}")]
    NotFound(String),
}

/// Result of an update that succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The row changed and its `updated_at` was bumped.
    Updated,
    /// Payload and status already had these values; nothing was written.
    Unchanged,
}

/// Trait for item table backends.
pub trait ItemLedger: Send + Sync {
    /// Point lookup by canonical address. `None` is the normal first-sighting case.
    fn find(&self, address: &str) -> Result<Option<LedgerItem>, LedgerError>;

    /// Insert a row for a newly discovered entry with the given initial status.
    ///
    /// Returns [`LedgerError::AlreadyExists`] if the address already has a row.
    fn create(&self, entry: &DiscoveredEntry, status: StatusId) -> Result<LedgerItem, LedgerError>;

    /// Store the enrichment payload and status for the row matching `address`.
    fn update_payload_and_status(
        &self,
        address: &str,
        payload: &str,
        status: StatusId,
    ) -> Result<UpdateOutcome, LedgerError>;
}
