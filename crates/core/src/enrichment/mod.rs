//! Enrichment service client and status reconciliation.

mod client;
mod error;
mod request;

pub use client::{EnrichmentClient, EnrichmentResponse, Reconciled};
pub use error::EnrichmentError;
pub use request::build_request_url;
