//! Pipeline result types.

use thiserror::Error;

use crate::download::DownloadError;
use crate::enrichment::EnrichmentError;
use crate::ledger::LedgerError;
use crate::status::{StatusError, StatusId};

/// Step at which an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading the ledger row or its status.
    Lookup,
    /// Creating the ledger row.
    Ingest,
    Download,
    Enrichment,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Lookup => "lookup",
            Stage::Ingest => "ingest",
            Stage::Download => "download",
            Stage::Enrichment => "enrichment",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any per-item failure. Contained to the item; never aborts a batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Catalog(#[from] StatusError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),
}

/// What happened to one entry.
#[derive(Debug)]
pub enum ItemOutcome {
    /// The item was already finished; nothing was written or fetched.
    AlreadyTerminal { status: StatusId },
    /// Submitted; the service reported a status that still needs work.
    Pending { status: StatusId },
    /// Submitted; the service reported a terminal status.
    Terminal { status: StatusId },
    /// Processing stopped at `stage`. The row keeps its previous status.
    Failed { stage: Stage, error: PipelineError },
}

impl ItemOutcome {
    pub fn metric_label(&self) -> &'static str {
        match self {
            ItemOutcome::AlreadyTerminal { .. } => "already_terminal",
            ItemOutcome::Pending { .. } => "pending",
            ItemOutcome::Terminal { .. } => "terminal",
            ItemOutcome::Failed { .. } => "failed",
        }
    }
}

/// Result of one entry including whether its ledger row was created now.
#[derive(Debug)]
pub struct ItemReport {
    pub address: String,
    pub created: bool,
    pub outcome: ItemOutcome,
}

/// Counts for one pipeline pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub seen: usize,
    pub created: usize,
    pub already_terminal: usize,
    pub pending: usize,
    pub terminal: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, report: &ItemReport) {
        self.seen += 1;
        if report.created {
            self.created += 1;
        }
        match report.outcome {
            ItemOutcome::AlreadyTerminal { .. } => self.already_terminal += 1,
            ItemOutcome::Pending { .. } => self.pending += 1,
            ItemOutcome::Terminal { .. } => self.terminal += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
    }
}
