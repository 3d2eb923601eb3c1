//! Status storage trait and error type.

use thiserror::Error;

use super::StatusCode;
use super::StatusId;

/// Errors from the status table and its in-memory mirror.
#[derive(Debug, Error)]
pub enum StatusError {
    /// The store could not be reached. Fatal at startup.
    #[error("Status store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to read status table: {0}")]
    StoreReadFailed(String),

    #[error("Failed to write status table: {0}")]
    StoreWriteFailed(String),

    /// Another writer inserted the same label first.
    #[error("Status label already exists: {0}")]
    AlreadyExists(String),

    /// The id is not in the in-memory mirror. Indicates cache/store divergence.
    #[error("Unknown status id: {0}")]
    UnknownStatus(StatusId),
}

/// Trait for status table backends.
pub trait StatusStore: Send + Sync {
    /// Read every status row, ordered by id.
    fn load_all(&self) -> Result<Vec<StatusCode>, StatusError>;

    /// Point lookup by label.
    fn find_by_label(&self, label: &str) -> Result<Option<StatusCode>, StatusError>;

    /// Insert a new label and return the row with its assigned id.
    ///
    /// Returns [`StatusError::AlreadyExists`] when the label is already present.
    fn insert(&self, label: &str, pending: bool) -> Result<StatusCode, StatusError>;
}
