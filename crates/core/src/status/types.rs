use serde::{Deserialize, Serialize};

/// Store-assigned status identifier.
pub type StatusId = i64;

/// One pipeline stage as known to the status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    pub id: StatusId,
    /// Unique human-readable label (e.g. "processing").
    pub label: String,
    /// True while items in this status still need further processing.
    pub pending: bool,
}

impl StatusCode {
    pub fn new(id: StatusId, label: impl Into<String>, pending: bool) -> Self {
        Self {
            id,
            label: label.into(),
            pending,
        }
    }
}
