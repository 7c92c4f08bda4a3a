//! reqwest HTTP Transport
//!
//! Implements the [`HttpTransport`] port on top of a shared
//! `reqwest::Client`. Only the connect phase has a timeout: streaming
//! bodies stay open indefinitely and are ended by the caller.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;

use crate::application::ports::{HttpResponse, HttpTransport, PostRequest, TransportError};

/// Default TCP/TLS connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("sitestream-client/", env!("CARGO_PKG_VERSION"));

/// HTTP transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the given connect timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if the client cannot be
    /// built, e.g. when the TLS backend cannot be initialized.
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing client, e.g. one with a proxy or custom root
    /// certificates. Do not set a total request timeout on it: stream
    /// bodies would be cut off when it expires.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: PostRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Connection(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        tracing::debug!(url = %request.url, status, "POST completed");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));

        Ok(HttpResponse {
            status,
            body: Box::pin(body),
        })
    }
}
