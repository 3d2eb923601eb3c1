//! Ledger data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::status::StatusId;

/// Store-assigned item identifier.
pub type ItemId = i64;

/// One feed item with an enclosure, as delivered by the feed source.
///
/// Ephemeral: consumed by a single pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredEntry {
    pub title: String,
    pub description: String,
    /// Publish date as found in the feed (RFC 1123 with numeric zone).
    pub pub_date: String,
    pub guid: String,
    /// Enclosure URL; the canonical key of the item.
    pub address: String,
    /// Declared enclosure length in bytes.
    pub length: i64,
    /// Declared enclosure media type.
    pub media_type: String,
}

impl DiscoveredEntry {
    /// File name the enclosure is stored under: `<guid>.mp3`.
    ///
    /// Characters that could escape the storage root are replaced with `_`.
    /// When that changes the guid, a short SHA-256 prefix of the raw guid is
    /// appended so distinct guids never share a file.
    pub fn local_filename(&self) -> String {
        if self.guid.is_empty() {
            return "unnamed.mp3".to_string();
        }

        let sanitized: String = self
            .guid
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = sanitized.trim_start_matches('.');
        if stem == self.guid {
            return format!("{}.mp3", stem);
        }

        let digest = format!("{:x}", Sha256::digest(self.guid.as_bytes()));
        let tag = &digest[..12];
        if stem.is_empty() {
            format!("{}.mp3", tag)
        } else {
            format!("{}-{}.mp3", stem, tag)
        }
    }

    /// Parsed publish date, `None` when the feed value is not RFC 1123.
    pub fn parsed_pub_date(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc2822(self.pub_date.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }
}

/// Persisted record of one enclosure under processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerItem {
    pub id: ItemId,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: StatusId,
    pub title: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub guid: String,
    /// Canonical enclosure address (unique).
    pub url: String,
    pub filename: String,
    pub length: i64,
    pub media_type: String,
    /// Raw enrichment response, empty until the first successful submission.
    pub payload: String,
}
