pub mod config;
pub mod download;
pub mod enrichment;
pub mod feed;
pub mod ledger;
pub mod metrics;
pub mod pipeline;
pub mod status;
pub mod testing;
pub mod transport;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    EnrichmentConfig, FeedConfig, PipelineConfig, SanitizedConfig, StorageConfig,
};
pub use download::{DownloadError, Downloader};
pub use enrichment::{
    build_request_url, EnrichmentClient, EnrichmentError, EnrichmentResponse, Reconciled,
};
pub use feed::{parse_feed, FeedBatch, FeedError, FeedSource, RssFeedSource};
pub use ledger::{
    DiscoveredEntry, ItemId, ItemLedger, LedgerError, LedgerItem, SqliteItemLedger, UpdateOutcome,
};
pub use pipeline::{BatchSummary, IngestPipeline, ItemOutcome, ItemReport, PipelineError, Stage};
pub use status::{SqliteStatusStore, StatusCatalog, StatusCode, StatusError, StatusId, StatusStore};
pub use transport::{
    ByteStream, HttpResponse, ReqwestTransport, StreamResponse, Transport, TransportError,
};
