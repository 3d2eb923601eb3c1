//! `reqwest`-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::debug;

use super::{HttpResponse, StreamResponse, Transport, TransportError};

/// Transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport bounded by `timeout`.
    ///
    /// Connecting and every idle gap while reading are limited to `timeout`.
    /// A buffered [`Transport::get`] must also complete within it; a streamed
    /// body may take as long as it needs while data keeps arriving.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(concat!("feedpipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    async fn send(
        &self,
        url: &str,
        deadline: Option<Duration>,
    ) -> Result<reqwest::Response, TransportError> {
        debug!(url = url, deadline = ?deadline, "GET");
        let mut request = self.client.get(url);
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }
        request.send().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::ConnectionFailed(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self.send(url, Some(self.timeout)).await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }

    async fn get_stream(&self, url: &str) -> Result<StreamResponse, TransportError> {
        let response = self.send(url, None).await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| TransportError::Body(e.to_string()))
            })
            .boxed();

        Ok(StreamResponse {
            status,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::trickle_server;

    #[test]
    fn test_new_transport() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on localhost is essentially never listening.
        let result = transport.get("http://127.0.0.1:9/feed.xml").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stream_outlasts_timeout_while_data_flows() {
        let url = trickle_server(10, Duration::from_millis(250)).await;
        let transport = ReqwestTransport::new(Duration::from_secs(1)).unwrap();

        let response = transport.get_stream(&url).await.unwrap();
        assert_eq!(response.content_length, Some(40));

        let chunks: Vec<_> = response.body.collect().await;
        let body: Vec<u8> = chunks.into_iter().flat_map(|c| c.unwrap()).collect();
        assert_eq!(body.len(), 40);
    }

    #[tokio::test]
    async fn test_stream_fails_when_body_stalls() {
        let url = trickle_server(2, Duration::from_secs(3)).await;
        let transport = ReqwestTransport::new(Duration::from_millis(300)).unwrap();

        let response = transport.get_stream(&url).await.unwrap();
        let chunks: Vec<_> = response.body.collect().await;

        assert!(chunks.iter().any(|c| c.is_err()));
    }

    #[tokio::test]
    async fn test_buffered_get_keeps_total_deadline() {
        let url = trickle_server(10, Duration::from_millis(250)).await;
        let transport = ReqwestTransport::new(Duration::from_secs(1)).unwrap();

        assert!(transport.get(&url).await.is_err());
    }
}
