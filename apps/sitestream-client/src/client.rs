//! OAuth Client Facade
//!
//! [`OAuthClient`] bundles the consumer credentials, the provider
//! endpoints and an HTTP transport, and exposes the whole consumer
//! surface: the token exchange, opening a stream, closing it, and the
//! receiving end of the record delivery channel.
//!
//! At most one stream connector is active per client. `connect` installs
//! the new connector first, then closes and joins the previous one before
//! opening the next request, so the delivery channel never carries
//! records from a superseded connection once `connect` has returned.
//!
//! `close` only touches the active slot and never waits for a pending
//! `connect`: closing while the first request is in flight cancels it, and
//! that `connect` returns `StreamError::Closed`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use crate::application::ports::HttpTransport;
use crate::domain::record::StreamRecord;
use crate::domain::token::{AccessToken, RequestToken, Token};
use crate::infrastructure::config::{ClientConfig, Endpoints, StreamSettings};
use crate::infrastructure::http::ReqwestTransport;
use crate::infrastructure::oauth::{Credentials, OAuthError, SignatureParameters, TokenExchange};
use crate::infrastructure::stream::{
    ConnectorState, ReconnectConfig, StreamConnector, StreamError, StreamTarget,
};

/// Form parameter listing the users of a site stream.
pub const FOLLOW_PARAM: &str = "follow";

/// Client-level errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Signing or token exchange failed.
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Opening the stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A site stream needs at least one user id.
    #[error("site stream requires at least one user id")]
    EmptyFollowList,
}

/// OAuth1.0a client with a single managed stream.
pub struct OAuthClient {
    credentials: Credentials,
    endpoints: Endpoints,
    transport: Arc<dyn HttpTransport>,
    reconnect: ReconnectConfig,
    delivery: mpsc::Sender<StreamRecord>,
    records: Option<mpsc::Receiver<StreamRecord>>,
    active: Mutex<Option<Arc<StreamConnector>>>,
    connecting: AsyncMutex<()>,
}

impl OAuthClient {
    /// Create a client over an explicit transport.
    #[must_use]
    pub fn new(
        credentials: Credentials,
        endpoints: Endpoints,
        transport: Arc<dyn HttpTransport>,
        settings: &StreamSettings,
    ) -> Self {
        let (delivery, records) = mpsc::channel(settings.delivery_capacity.max(1));
        Self {
            credentials,
            endpoints,
            transport,
            reconnect: ReconnectConfig::new(settings.retry_interval),
            delivery,
            records: Some(records),
            active: Mutex::new(None),
            connecting: AsyncMutex::new(()),
        }
    }

    /// Create a client with default endpoints and a reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are empty or the HTTP client
    /// cannot be built.
    pub fn with_defaults(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        let settings = StreamSettings::default();
        let transport = ReqwestTransport::new(settings.connect_timeout)?;
        Ok(Self::new(
            Credentials::new(consumer_key, consumer_secret)?,
            Endpoints::default(),
            Arc::new(transport),
            &settings,
        ))
    }

    /// Create a client from loaded configuration with a reqwest transport.
    ///
    /// # Errors
    ///
    /// Same as [`with_defaults`](Self::with_defaults).
    pub fn from_config(config: &ClientConfig) -> Result<Self, OAuthError> {
        let transport = ReqwestTransport::new(config.stream.connect_timeout)?;
        Ok(Self::new(
            Credentials::new(config.consumer_key.clone(), config.consumer_secret.clone())?,
            config.endpoints.clone(),
            Arc::new(transport),
            &config.stream,
        ))
    }

    /// Provider endpoints in use.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Take the receiving end of the delivery channel.
    ///
    /// Returns `None` after the first call. The channel lives as long as
    /// the client and carries records from whichever connector is active.
    pub fn take_records(&mut self) -> Option<mpsc::Receiver<StreamRecord>> {
        self.records.take()
    }

    /// Obtain a request token (`callback` = `oob` for the PIN flow).
    ///
    /// # Errors
    ///
    /// See [`TokenExchange::request_token`].
    pub async fn request_token(&self, callback: &str) -> Result<RequestToken, OAuthError> {
        self.exchange().request_token(callback).await
    }

    /// URL the user visits to authorize `request_token`.
    #[must_use]
    pub fn authorize_url(&self, request_token: &RequestToken) -> String {
        self.exchange().authorize_url(request_token)
    }

    /// Exchange an authorized request token and verifier for an access token.
    ///
    /// # Errors
    ///
    /// See [`TokenExchange::access_token`].
    pub async fn access_token(
        &self,
        request_token: &RequestToken,
        verifier: &str,
    ) -> Result<AccessToken, OAuthError> {
        self.exchange().access_token(request_token, verifier).await
    }

    /// Open a signed stream to `url`, replacing any active stream.
    ///
    /// The previous connector is closed and its reader joined before the
    /// new request is sent. Only the first request's failure is returned;
    /// afterwards the connector reconnects on its own until closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial request fails, the endpoint answers
    /// with a status other than 200, or [`close`](Self::close) is called
    /// before the first response arrives.
    pub async fn connect(
        &self,
        url: &str,
        token: &Token,
        form: SignatureParameters,
    ) -> Result<(), ClientError> {
        let _connecting = self.connecting.lock().await;

        let connector = Arc::new(StreamConnector::new(
            self.credentials.clone(),
            Arc::clone(&self.transport),
            StreamTarget {
                url: url.to_string(),
                token: token.clone(),
                form,
            },
            self.reconnect.clone(),
        ));
        let previous = self.active.lock().replace(Arc::clone(&connector));

        if let Some(previous) = previous {
            tracing::info!(url = %previous.target().url, "Replacing active stream");
            previous.close();
            previous.join().await;
        }

        if let Err(e) = connector.start(self.delivery.clone()).await {
            let mut active = self.active.lock();
            if active.as_ref().is_some_and(|c| Arc::ptr_eq(c, &connector)) {
                *active = None;
            }
            return Err(e.into());
        }

        Ok(())
    }

    /// Open a site stream for the given user ids.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::EmptyFollowList` for an empty id list,
    /// otherwise the same errors as [`connect`](Self::connect).
    pub async fn site_stream(&self, token: &Token, follow: &[u64]) -> Result<(), ClientError> {
        if follow.is_empty() {
            return Err(ClientError::EmptyFollowList);
        }

        let ids = follow
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut form = SignatureParameters::new();
        form.insert(FOLLOW_PARAM.to_string(), ids);

        let url = self.endpoints.stream_url.clone();
        self.connect(&url, token, form).await
    }

    /// Close the active stream and wait for its reader to exit.
    ///
    /// No-op when no stream is active or it is already closed.
    ///
    /// # Example
    ///
    /// ```
    /// use sitestream_client::OAuthClient;
    ///
    /// tokio_test::block_on(async {
    ///     let client = OAuthClient::with_defaults("consumer-key", "consumer-secret").unwrap();
    ///     client.close().await;
    ///     assert!(!client.is_streaming());
    ///     assert_eq!(client.stream_state(), None);
    /// });
    /// ```
    pub async fn close(&self) {
        let connector = self.active.lock().take();
        let Some(connector) = connector else {
            tracing::debug!("No active stream to close");
            return;
        };
        connector.close();
        connector.join().await;
    }

    /// State of the active connector, if any.
    #[must_use]
    pub fn stream_state(&self) -> Option<ConnectorState> {
        self.active.lock().as_ref().map(|c| c.state())
    }

    /// Whether a connector is active and not closed.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.active.lock().as_ref().is_some_and(|c| !c.is_closed())
    }

    fn exchange(&self) -> TokenExchange<'_> {
        TokenExchange::new(&self.credentials, self.transport.as_ref(), &self.endpoints)
    }
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("credentials", &self.credentials)
            .field("endpoints", &self.endpoints)
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}
