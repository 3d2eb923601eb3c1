use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("feedpipe.db")
}

/// Feed source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Feed URL (RSS 2.0)
    pub url: String,
    /// Timeout for every outbound request in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Local enclosure storage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory enclosures are written to
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// When false, downloads are skipped entirely
    #[serde(default = "default_save_to_disk")]
    pub save_to_disk: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            save_to_disk: default_save_to_disk(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_save_to_disk() -> bool {
    true
}

/// Enrichment service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    /// Service base URL (e.g., "http://api.example.com")
    pub servlet: String,
    /// Status sub-path appended to the base URL path (e.g., "/stream-status")
    #[serde(default)]
    pub status_path: String,
    /// Value sent as the `href` parameter
    #[serde(default)]
    pub referer: String,
    /// Account/adset identifier sent as the `adset` parameter
    #[serde(default)]
    pub adset: String,
}

/// Item processing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Status label assigned to newly ingested items
    #[serde(default = "default_initial_status")]
    pub initial_status: String,
    /// Number of feed entries processed concurrently within one pass
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_status: default_initial_status(),
            max_concurrent_items: default_max_concurrent_items(),
        }
    }
}

fn default_initial_status() -> String {
    "entered".to_string()
}

fn default_max_concurrent_items() -> usize {
    1
}

/// Sanitized config for logging (account identifier redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub feed: FeedConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub enrichment: SanitizedEnrichmentConfig,
}

/// Sanitized enrichment config (adset hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEnrichmentConfig {
    pub servlet: String,
    pub status_path: String,
    pub referer: String,
    pub adset_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            feed: config.feed.clone(),
            database: config.database.clone(),
            storage: config.storage.clone(),
            pipeline: config.pipeline.clone(),
            enrichment: SanitizedEnrichmentConfig {
                servlet: config.enrichment.servlet.clone(),
                status_path: config.enrichment.status_path.clone(),
                referer: config.enrichment.referer.clone(),
                adset_configured: !config.enrichment.adset.is_empty(),
            },
        }
    }
}
