//! Per-item ingestion state machine.
//!
//! Each discovered entry moves `Unseen -> Ingested -> Downloaded -> Submitted
//! -> Terminal`. Only the ledger row and its status id are persisted; whether
//! an item is finished is read from the status's pending flag.

mod runner;
mod types;

pub use runner::IngestPipeline;
pub use types::{BatchSummary, ItemOutcome, ItemReport, PipelineError, Stage};
