//! Ingestion pipeline implementation.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::download::Downloader;
use crate::enrichment::EnrichmentClient;
use crate::feed::{FeedError, FeedSource};
use crate::ledger::{DiscoveredEntry, ItemLedger, LedgerError, LedgerItem};
use crate::metrics;
use crate::status::{StatusCatalog, StatusError, StatusId};

use super::types::{BatchSummary, ItemOutcome, ItemReport, PipelineError, Stage};

/// Drives discovered entries through ingest, download and enrichment.
pub struct IngestPipeline {
    catalog: Arc<StatusCatalog>,
    ledger: Arc<dyn ItemLedger>,
    downloader: Downloader,
    enrichment: EnrichmentClient,
    initial_status: StatusId,
    max_concurrent_items: usize,
}

impl std::fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("catalog", &self.catalog)
            .field("downloader", &self.downloader)
            .field("enrichment", &self.enrichment)
            .field("initial_status", &self.initial_status)
            .field("max_concurrent_items", &self.max_concurrent_items)
            .finish()
    }
}

/// Where the state machine stands for an entry after the ledger checks.
enum Admission {
    Done(StatusId),
    Proceed { item: LedgerItem, created: bool },
}

impl IngestPipeline {
    /// Create the pipeline. The catalog must already be loaded.
    ///
    /// Registers the configured initial status (pending) if the catalog does
    /// not know it yet.
    pub fn new(
        config: &PipelineConfig,
        catalog: Arc<StatusCatalog>,
        ledger: Arc<dyn ItemLedger>,
        downloader: Downloader,
        enrichment: EnrichmentClient,
    ) -> Result<Self, StatusError> {
        let initial_status = catalog.ensure(&config.initial_status, true)?;
        info!(
            label = %config.initial_status,
            id = initial_status,
            "Initial item status"
        );

        Ok(Self {
            catalog,
            ledger,
            downloader,
            enrichment,
            initial_status,
            max_concurrent_items: config.max_concurrent_items.max(1),
        })
    }

    pub fn initial_status(&self) -> StatusId {
        self.initial_status
    }

    /// Poll `source` once and process every delivered entry.
    pub async fn run_once(&self, source: &dyn FeedSource) -> Result<BatchSummary, FeedError> {
        let batch = source.poll().await?;
        info!(
            channel = %batch.channel_title,
            entries = batch.entries.len(),
            "New items in feed"
        );
        Ok(self.process_batch(batch.entries).await)
    }

    /// Process a batch of entries. Failures are counted, never propagated.
    ///
    /// Repeated addresses within one batch are processed once, so concurrent
    /// workers never share a download target.
    pub async fn process_batch(&self, entries: Vec<DiscoveredEntry>) -> BatchSummary {
        let mut addresses = HashSet::new();
        let entries: Vec<DiscoveredEntry> = entries
            .into_iter()
            .filter(|entry| {
                let first = addresses.insert(entry.address.clone());
                if !first {
                    debug!(address = %entry.address, "Duplicate address in batch, skipping");
                }
                first
            })
            .collect();

        let reports: Vec<ItemReport> = futures::stream::iter(entries.iter())
            .map(|entry| self.process_entry(entry))
            .buffer_unordered(self.max_concurrent_items)
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for report in &reports {
            summary.record(report);
        }

        info!(
            seen = summary.seen,
            created = summary.created,
            already_terminal = summary.already_terminal,
            pending = summary.pending,
            terminal = summary.terminal,
            failed = summary.failed,
            "Pass complete"
        );
        summary
    }

    /// Run the state machine for one entry.
    pub async fn process_entry(&self, entry: &DiscoveredEntry) -> ItemReport {
        info!(address = %entry.address, title = %entry.title, "Handling entry");

        let (created, outcome) = match self.admit(entry) {
            Ok(Admission::Done(status)) => {
                info!(
                    address = %entry.address,
                    status = status,
                    label = %self.label(status),
                    "Already terminal, skipping"
                );
                (false, ItemOutcome::AlreadyTerminal { status })
            }
            Ok(Admission::Proceed { item, created }) => (created, self.advance(entry, &item).await),
            Err((stage, error)) => (false, Self::failed(entry, stage, error)),
        };

        metrics::ITEMS_PROCESSED
            .with_label_values(&[outcome.metric_label()])
            .inc();

        ItemReport {
            address: entry.address.clone(),
            created,
            outcome,
        }
    }

    /// Ledger lookup and creation: steps 1 to 3.
    fn admit(&self, entry: &DiscoveredEntry) -> Result<Admission, (Stage, PipelineError)> {
        let existing = self
            .ledger
            .find(&entry.address)
            .map_err(|e| (Stage::Lookup, PipelineError::Ledger(e)))?;

        if let Some(item) = existing {
            return self.admit_existing(item);
        }

        match self.ledger.create(entry, self.initial_status) {
            Ok(item) => Ok(Admission::Proceed {
                item,
                created: true,
            }),
            Err(LedgerError::AlreadyExists(_)) => {
                // Lost a race with a concurrent first sighting.
                let item = self
                    .ledger
                    .find(&entry.address)
                    .map_err(|e| (Stage::Lookup, PipelineError::Ledger(e)))?
                    .ok_or_else(|| {
                        (
                            Stage::Ingest,
                            PipelineError::Ledger(LedgerError::NotFound(entry.address.clone())),
                        )
                    })?;
                self.admit_existing(item)
            }
            Err(e) => Err((Stage::Ingest, PipelineError::Ledger(e))),
        }
    }

    fn admit_existing(&self, item: LedgerItem) -> Result<Admission, (Stage, PipelineError)> {
        let pending = self.catalog.is_pending(item.status).map_err(|e| {
            error!(
                address = %item.url,
                status = item.status,
                "Ledger row references a status the catalog does not know"
            );
            (Stage::Lookup, PipelineError::from(e))
        })?;

        if pending {
            info!(address = %item.url, status = item.status, "Found unfinished item, resuming");
            Ok(Admission::Proceed {
                item,
                created: false,
            })
        } else {
            Ok(Admission::Done(item.status))
        }
    }

    /// Download and enrichment: steps 4 to 6.
    async fn advance(&self, entry: &DiscoveredEntry, item: &LedgerItem) -> ItemOutcome {
        let path = self.downloader.local_path(&item.filename);
        match self.downloader.ensure_local(&path, &entry.address).await {
            Ok(written) => {
                if written > 0 && entry.length > 0 && written != entry.length as u64 {
                    warn!(
                        address = %entry.address,
                        declared = entry.length,
                        written = written,
                        "Downloaded size differs from declared enclosure length"
                    );
                }
            }
            Err(e) => return Self::failed(entry, Stage::Download, e.into()),
        }

        match self.enrichment.enrich(&entry.address).await {
            Ok(reconciled) if reconciled.pending => ItemOutcome::Pending {
                status: reconciled.status,
            },
            Ok(reconciled) => {
                info!(
                    address = %entry.address,
                    status = reconciled.status,
                    label = %self.label(reconciled.status),
                    "Item reached terminal status"
                );
                ItemOutcome::Terminal {
                    status: reconciled.status,
                }
            }
            Err(e) => Self::failed(entry, Stage::Enrichment, e.into()),
        }
    }

    fn label(&self, id: StatusId) -> String {
        self.catalog
            .get(id)
            .map(|status| status.label)
            .unwrap_or_default()
    }

    fn failed(entry: &DiscoveredEntry, stage: Stage, error: PipelineError) -> ItemOutcome {
        if matches!(error, PipelineError::Catalog(StatusError::UnknownStatus(_))) {
            error!(address = %entry.address, stage = %stage, error = %error, "Status catalog diverged from store");
        } else {
            warn!(address = %entry.address, stage = %stage, error = %error, "Item processing failed");
        }
        ItemOutcome::Failed { stage, error }
    }
}
