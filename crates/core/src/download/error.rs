//! Error types for the download module.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while materializing an enclosure.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The remote resource could not be retrieved.
    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The local file could not be created or written.
    #[error("Failed to write {path}")]
    StorageWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub fn fetch_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn storage_write_failed(path: &Path, source: std::io::Error) -> Self {
        Self::StorageWriteFailed {
            path: path.to_path_buf(),
            source,
        }
    }
}
