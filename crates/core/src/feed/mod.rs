//! Feed source: turns a syndication feed into [`DiscoveredEntry`] batches.

mod rss;

pub use self::rss::{parse_feed, RssFeedSource};

use async_trait::async_trait;
use thiserror::Error;

use crate::ledger::DiscoveredEntry;

/// Errors raised while polling a feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to fetch feed {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Failed to parse feed: {0}")]
    ParseFailed(String),
}

/// Entries delivered by one poll.
#[derive(Debug, Clone, Default)]
pub struct FeedBatch {
    pub channel_title: String,
    pub channel_description: String,
    pub entries: Vec<DiscoveredEntry>,
    /// Items dropped because they carried no enclosure.
    pub skipped: usize,
}

/// A source of discovered entries, polled once per pipeline pass.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn poll(&self) -> Result<FeedBatch, FeedError>;
}
