//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `HttpTransport`: issues one signed POST and hands back the status
//!   and the (possibly endless) response body as a byte stream. Used by
//!   both the token exchange and the stream connector.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;

/// Response body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// An outbound POST request with its computed headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest {
    /// Target URL.
    pub url: String,
    /// Request headers, `Authorization` included.
    pub headers: Vec<(String, String)>,
    /// URL-encoded form body.
    pub body: String,
}

impl PostRequest {
    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status line and body of a response.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: ByteStream,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Drain the body into a string.
    ///
    /// Only meant for the short token-exchange responses; never call this
    /// on a streaming body.
    ///
    /// # Errors
    ///
    /// Returns an error if reading a chunk fails.
    pub async fn text(mut self) -> Result<String, TransportError> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk.map_err(|e| TransportError::Body(e.to_string()))?;
            buf.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Transport-level failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request could not be built (bad URL, invalid header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connecting or sending the request failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Reading the response body failed.
    #[error("body read failed: {0}")]
    Body(String),
}

/// Outbound HTTP capability.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a POST and return as soon as the response headers arrive.
    async fn post(&self, request: PostRequest) -> Result<HttpResponse, TransportError>;
}
