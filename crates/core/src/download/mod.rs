//! Idempotent enclosure download.

mod error;

pub use error::DownloadError;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::metrics;
use crate::transport::Transport;

/// Materializes enclosures under the storage root, at most once per path.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    root: PathBuf,
    enabled: bool,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("root", &self.root)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>, config: &StorageConfig) -> Self {
        Self {
            transport,
            root: config.root.clone(),
            enabled: config.save_to_disk,
        }
    }

    /// Whether downloads are performed at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Where an enclosure with this file name is stored.
    pub fn local_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Make sure `path` holds the resource at `source`.
    ///
    /// Returns the number of bytes transferred, which is 0 when downloads are
    /// disabled or a non-empty file already exists at `path`. A zero-byte file
    /// is treated as missing and overwritten. On failure any partially written
    /// file is left in place.
    pub async fn ensure_local(&self, path: &Path, source: &str) -> Result<u64, DownloadError> {
        if !self.enabled {
            debug!(path = %path.display(), "Saving to disk disabled, skipping download");
            return Ok(0);
        }

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => {
                info!(path = %path.display(), size = meta.len(), "Enclosure already downloaded");
                return Ok(0);
            }
            Ok(_) => {
                debug!(path = %path.display(), "Found empty placeholder, downloading");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(DownloadError::storage_write_failed(path, e)),
        }

        self.download(path, source).await
    }

    async fn download(&self, path: &Path, source: &str) -> Result<u64, DownloadError> {
        info!(url = source, "Fetching enclosure");
        let response = self
            .transport
            .get_stream(source)
            .await
            .map_err(|e| DownloadError::fetch_failed(source, e.to_string()))?;

        if !response.is_success() {
            return Err(DownloadError::fetch_failed(
                source,
                format!("HTTP {}", response.status),
            ));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::storage_write_failed(parent, e))?;
        }

        info!(path = %path.display(), "Creating enclosure file");
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| DownloadError::storage_write_failed(path, e))?;

        let mut written: u64 = 0;
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| DownloadError::fetch_failed(source, e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::storage_write_failed(path, e))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::storage_write_failed(path, e))?;

        metrics::BYTES_DOWNLOADED.inc_by(written);
        info!(path = %path.display(), bytes = written, "Enclosure written");
        Ok(written)
    }
}
