//! HTTP transport used for feed fetches, enclosure downloads and enrichment
//! submissions.

mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Streamed response body, one chunk per item.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, for diagnostics and payload storage.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A response whose body has not been read yet.
pub struct StreamResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("body", &"<stream>")
            .finish()
    }
}

impl StreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// GET-only HTTP transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and buffer the whole body.
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;

    /// Fetch `url` and hand back the body as a stream of chunks.
    async fn get_stream(&self, url: &str) -> Result<StreamResponse, TransportError>;
}
