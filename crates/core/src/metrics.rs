//! Prometheus metrics for the ingestion pipeline.
//!
//! This module provides metrics for:
//! - Items processed per pass, by outcome
//! - Enclosure bytes downloaded
//! - Enrichment requests, by result
//! - Status labels discovered at runtime

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Registry holding every pipeline metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Items processed total by outcome.
pub static ITEMS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("feedpipe_items_processed_total", "Total feed items processed"),
        &["outcome"], // "already_terminal", "pending", "terminal", "failed"
    )
    .unwrap()
});

/// Enclosure bytes written to disk.
pub static BYTES_DOWNLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "feedpipe_bytes_downloaded_total",
        "Total enclosure bytes written to local storage",
    )
    .unwrap()
});

/// Enrichment requests total by result.
pub static ENRICHMENT_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "feedpipe_enrichment_requests_total",
            "Total enrichment service requests",
        ),
        &["result"], // "ok", "request_failed", "malformed"
    )
    .unwrap()
});

/// Status labels inserted into the catalog at runtime.
pub static STATUSES_INSERTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "feedpipe_statuses_inserted_total",
        "Status labels first observed and inserted at runtime",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(ITEMS_PROCESSED.clone()))
        .unwrap();
    registry
        .register(Box::new(BYTES_DOWNLOADED.clone()))
        .unwrap();
    registry
        .register(Box::new(ENRICHMENT_REQUESTS.clone()))
        .unwrap();
    registry
        .register(Box::new(STATUSES_INSERTED.clone()))
        .unwrap();
}

/// Render the registry in the Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
