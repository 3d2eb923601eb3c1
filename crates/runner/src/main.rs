use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedpipe_core::{
    load_config, metrics, validate_config, Downloader, EnrichmentClient, IngestPipeline,
    ItemLedger, ReqwestTransport, RssFeedSource, SanitizedConfig, SqliteItemLedger,
    SqliteStatusStore, StatusCatalog, Transport,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("FEEDPIPE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("feedpipe.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    info!(
        "Configuration loaded: {}",
        serde_json::to_string(&sanitized).unwrap_or_default()
    );

    // Stores: any failure here is fatal
    let status_store = Arc::new(
        SqliteStatusStore::new(&config.database.path)
            .context("Failed to open status store")?,
    );
    let catalog = Arc::new(
        StatusCatalog::load(status_store).context("Failed to load status catalog")?,
    );
    info!("Status catalog loaded with {} statuses", catalog.len());

    let ledger: Arc<dyn ItemLedger> = Arc::new(
        SqliteItemLedger::new(&config.database.path).context("Failed to open item ledger")?,
    );
    info!("Item ledger initialized");

    let transport: Arc<dyn Transport> = Arc::new(
        ReqwestTransport::new(Duration::from_secs(config.feed.timeout_secs as u64))
            .context("Failed to create HTTP transport")?,
    );

    let downloader = Downloader::new(Arc::clone(&transport), &config.storage);
    if downloader.is_enabled() {
        info!("Saving enclosures under {:?}", config.storage.root);
    } else {
        info!("Saving enclosures disabled");
    }

    let enrichment = EnrichmentClient::new(
        Arc::clone(&transport),
        config.enrichment.clone(),
        Arc::clone(&catalog),
        Arc::clone(&ledger),
    );

    let pipeline = IngestPipeline::new(
        &config.pipeline,
        Arc::clone(&catalog),
        ledger,
        downloader,
        enrichment,
    )
    .context("Failed to register initial status")?;

    let source = RssFeedSource::new(config.feed.url.clone(), Arc::clone(&transport));

    let summary = pipeline
        .run_once(&source)
        .await
        .with_context(|| format!("Feed poll failed for {}", config.feed.url))?;

    info!(
        "Pass finished: {} seen, {} new, {} already done, {} pending, {} done, {} failed",
        summary.seen,
        summary.created,
        summary.already_terminal,
        summary.pending,
        summary.terminal,
        summary.failed
    );
    debug!("Metrics:\n{}", metrics::gather_text());

    Ok(())
}
