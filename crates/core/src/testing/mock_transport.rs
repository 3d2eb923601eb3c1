//! Mock transport for testing.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::transport::{HttpResponse, StreamResponse, Transport, TransportError};

/// Chunk size used when streaming a scripted body.
const CHUNK_SIZE: usize = 4;

#[derive(Debug, Clone)]
enum MockRoute {
    Respond { status: u16, body: Vec<u8> },
    /// Streams `body` and then fails, simulating a dropped connection.
    Truncated { body: Vec<u8> },
    Fail(String),
}

/// Mock implementation of the Transport trait.
///
/// Provides controllable behavior for testing:
/// - Scripted responses per URL (unscripted URLs answer 404)
/// - Responses replaced between calls to simulate a remote changing state
/// - Connection failures and truncated bodies
/// - Every requested URL is recorded for assertions
///
/// # Example
///
/// ```rust,ignore
/// use feedpipe_core::testing::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.respond("http://x/a.mp3", 200, b"ID3...".to_vec()).await;
/// transport.respond_json("http://api/status?url=...", r#"{"status":"done"}"#).await;
///
/// // ... run the pipeline ...
///
/// assert_eq!(transport.request_count("http://x/a.mp3").await, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: Arc<RwLock<HashMap<String, MockRoute>>>,
    requests: Arc<RwLock<Vec<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with the given status and body.
    pub async fn respond(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.routes.write().await.insert(
            url.to_string(),
            MockRoute::Respond {
                status,
                body: body.into(),
            },
        );
    }

    /// Answer `url` with a 200 and the given JSON text.
    pub async fn respond_json(&self, url: &str, json: &str) {
        self.respond(url, 200, json.as_bytes().to_vec()).await;
    }

    /// Stream `body` for `url`, then fail before the response completes.
    pub async fn respond_truncated(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.routes
            .write()
            .await
            .insert(url.to_string(), MockRoute::Truncated { body: body.into() });
    }

    /// Fail every request to `url` with a connection error.
    pub async fn fail(&self, url: &str, reason: &str) {
        self.routes
            .write()
            .await
            .insert(url.to_string(), MockRoute::Fail(reason.to_string()));
    }

    /// All requested URLs in request order.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }

    /// How many times `url` was requested.
    pub async fn request_count(&self, url: &str) -> usize {
        self.requests
            .read()
            .await
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    /// Requests whose URL starts with `prefix`.
    pub async fn requests_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|u| u.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub async fn clear_requests(&self) {
        self.requests.write().await.clear();
    }

    async fn route(&self, url: &str) -> MockRoute {
        self.requests.write().await.push(url.to_string());
        self.routes
            .read()
            .await
            .get(url)
            .cloned()
            .unwrap_or(MockRoute::Respond {
                status: 404,
                body: b"not found".to_vec(),
            })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        match self.route(url).await {
            MockRoute::Respond { status, body } => Ok(HttpResponse {
                status,
                content_length: Some(body.len() as u64),
                body,
            }),
            MockRoute::Truncated { .. } => Err(TransportError::Body(
                "connection reset while reading body".to_string(),
            )),
            MockRoute::Fail(reason) => Err(TransportError::ConnectionFailed(reason)),
        }
    }

    async fn get_stream(&self, url: &str) -> Result<StreamResponse, TransportError> {
        match self.route(url).await {
            MockRoute::Respond { status, body } => {
                let content_length = Some(body.len() as u64);
                let chunks: Vec<Result<Vec<u8>, TransportError>> =
                    body.chunks(CHUNK_SIZE).map(|c| Ok(c.to_vec())).collect();
                Ok(StreamResponse {
                    status,
                    content_length,
                    body: futures::stream::iter(chunks).boxed(),
                })
            }
            MockRoute::Truncated { body } => {
                let mut chunks: Vec<Result<Vec<u8>, TransportError>> =
                    body.chunks(CHUNK_SIZE).map(|c| Ok(c.to_vec())).collect();
                chunks.push(Err(TransportError::Body(
                    "connection reset while reading body".to_string(),
                )));
                Ok(StreamResponse {
                    status: 200,
                    content_length: None,
                    body: futures::stream::iter(chunks).boxed(),
                })
            }
            MockRoute::Fail(reason) => Err(TransportError::ConnectionFailed(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_url_is_404() {
        let transport = MockTransport::new();
        let response = transport.get("http://x/missing").await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(transport.request_count("http://x/missing").await, 1);
    }

    #[tokio::test]
    async fn test_stream_reassembles_body() {
        let transport = MockTransport::new();
        transport.respond("http://x/a.mp3", 200, b"0123456789".to_vec()).await;

        let response = transport.get_stream("http://x/a.mp3").await.unwrap();
        let chunks: Vec<_> = response.body.collect().await;
        let body: Vec<u8> = chunks.into_iter().flat_map(|c| c.unwrap()).collect();
        assert_eq!(body, b"0123456789");
    }
}
