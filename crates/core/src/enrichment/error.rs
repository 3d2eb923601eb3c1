//! Error types for the enrichment module.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::status::StatusError;

/// Errors that can occur while submitting an item for enrichment.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The configured service URL cannot be parsed.
    #[error("Invalid enrichment endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Transport failure or non-2xx response.
    #[error("Enrichment request failed: {0}")]
    RequestFailed(String),

    /// Body is not JSON or has no string `status` field.
    #[error("Malformed enrichment response: {reason}")]
    MalformedResponse { reason: String, payload: String },

    #[error("Status catalog error: {0}")]
    Catalog(#[from] StatusError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl EnrichmentError {
    pub fn malformed(reason: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            payload: payload.into(),
        }
    }
}
