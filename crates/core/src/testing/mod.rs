//! Testing utilities and mock implementations.
//!
//! Provides a scripted [`MockTransport`] so the whole pipeline can be driven
//! without network access, plus fixture builders.
//!
//! # Example
//!
//! ```rust,ignore
//! use feedpipe_core::testing::{fixtures, MockTransport};
//!
//! let transport = MockTransport::new();
//! transport.respond("http://x/a.mp3", 200, b"ID3".to_vec()).await;
//!
//! let entry = fixtures::entry("http://x/a.mp3", "g1");
//! ```

mod mock_transport;

pub use mock_transport::MockTransport;

/// Start a one-shot HTTP server on localhost whose 200 response declares
/// `chunks * 4` bytes and sends them four at a time, `gap` apart.
///
/// Returns the URL to fetch.
#[cfg(test)]
pub(crate) async fn trickle_server(chunks: usize, gap: std::time::Duration) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = [0u8; 2048];
        let _ = socket.read(&mut request).await;

        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: {}\r\n\r\n",
            chunks * 4
        );
        if socket.write_all(header.as_bytes()).await.is_err() {
            return;
        }
        for _ in 0..chunks {
            tokio::time::sleep(gap).await;
            if socket.write_all(b"ID3.").await.is_err() || socket.flush().await.is_err() {
                return;
            }
        }
    });

    format!("http://{}/slow.mp3", addr)
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::config::{
        Config, DatabaseConfig, EnrichmentConfig, FeedConfig, PipelineConfig, StorageConfig,
    };
    use crate::ledger::DiscoveredEntry;

    /// Feed URL used by [`config`].
    pub const FEED_URL: &str = "http://feeds.example.com/radio.xml";

    /// An RSS document with two enclosure items and one item without an enclosure.
    pub const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Radio recordings</title>
    <link>http://www.example.com</link>
    <description>Recorded radio hours</description>
    <item>
      <title>KCBS_4 (KCBS) 02/12/15 01</title>
      <link>http://www.example.com</link>
      <description>KCBS_4 (KCBS) 02/12/15 01</description>
      <pubDate>Thu, 12 Feb 2015 16:19:31 +0000</pubDate>
      <guid isPermaLink="false">7c69a3cd6f79894e7f4bd5d808477d8e</guid>
      <enclosure url="http://content.example.com/storage/7c69a3cd6f79894e7f4bd5d808477d8e.mp3?sid=6da7&amp;partner_token=59" length="7172284" type="audio/mpeg"/>
    </item>
    <item>
      <title>Second hour</title>
      <description>No guid, bad length</description>
      <pubDate>Thu, 12 Feb 2015 17:19:31 +0000</pubDate>
      <enclosure url="http://content.example.com/storage/second.mp3" length="unknown" type="audio/mpeg"/>
    </item>
    <item>
      <title>Text only</title>
      <description>An announcement without media</description>
    </item>
  </channel>
</rss>
"#;

    /// A discovered entry with reasonable defaults.
    pub fn entry(address: &str, guid: &str) -> DiscoveredEntry {
        DiscoveredEntry {
            title: format!("Recording {}", guid),
            description: format!("Recording {} description", guid),
            pub_date: "Thu, 12 Feb 2015 16:19:31 +0000".to_string(),
            guid: guid.to_string(),
            address: address.to_string(),
            length: 0,
            media_type: "audio/mpeg".to_string(),
        }
    }

    /// Enrichment settings pointing at a fake service.
    pub fn enrichment_config() -> EnrichmentConfig {
        EnrichmentConfig {
            servlet: "http://api.example.com".to_string(),
            status_path: "/stream-status".to_string(),
            referer: "http://www.example.com/topics.html".to_string(),
            adset: "test-adset".to_string(),
        }
    }

    /// A full configuration storing the database and enclosures under `root`.
    pub fn config(root: &Path) -> Config {
        Config {
            feed: FeedConfig {
                url: FEED_URL.to_string(),
                timeout_secs: 5,
            },
            enrichment: enrichment_config(),
            database: DatabaseConfig {
                path: root.join("feedpipe.db"),
            },
            storage: StorageConfig {
                root: root.join("enclosures"),
                save_to_disk: true,
            },
            pipeline: PipelineConfig::default(),
        }
    }
}
