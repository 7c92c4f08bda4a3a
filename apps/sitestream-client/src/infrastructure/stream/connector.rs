//! Stream Connector
//!
//! Owns one long-lived signed POST to the streaming endpoint and a
//! background reader task that splits the body into lines, decodes
//! them, and forwards data records to the delivery channel.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──start──▶ Connecting ──200──▶ Streaming
//!                              │                  │ read failure
//!                         non-200/error           ▼
//!                              ▼             Reconnecting ◀──┐
//!                         (start fails)           │ open fails
//!                                                 ├──────────┘
//!                                                 │ 200
//!                                                 ▼
//!                                             Streaming
//!
//! close() from any state ──▶ Closed
//! ```
//!
//! Every await in the reader races the connector's [`CancellationToken`],
//! so `close` unblocks a pending read, retry sleep, reconnect request or
//! delivery immediately. Once the reader has been joined, no further
//! record from this connector can reach the channel.
//!
//! All methods take `&self`, so a connector shared behind an `Arc` can be
//! closed from another task while [`StreamConnector::start`] is still
//! waiting for the first response.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use super::codec::{Frame, LineCodec};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{ByteStream, HttpTransport, PostRequest, TransportError};
use crate::domain::record::StreamRecord;
use crate::domain::token::Token;
use crate::infrastructure::oauth::{
    Credentials, ProtocolParameters, SignableRequest, SignatureParameters, Signer, encode_form,
};

/// Content type of the stream request body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Longest accepted line, newline included. A longer line is treated as
/// a read failure and the stream is reopened.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

type LineReader = StreamReader<ByteStream, bytes::Bytes>;

/// What to connect to and how to sign it.
#[derive(Debug, Clone)]
pub struct StreamTarget {
    /// Streaming endpoint URL.
    pub url: String,
    /// Access token the request is signed with.
    pub token: Token,
    /// Form parameters sent as the body and included in the signature.
    pub form: SignatureParameters,
}

/// Observable connector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectorState {
    /// Not started.
    #[default]
    Disconnected,
    /// Initial request in flight.
    Connecting,
    /// Body is being read.
    Streaming,
    /// Waiting for, or performing, a reconnection attempt.
    Reconnecting {
        /// Attempts since the last successful open.
        attempt: u32,
    },
    /// Closed by the owner; terminal.
    Closed,
}

/// Stream connector errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// The HTTP request could not be completed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The endpoint answered with something other than 200.
    #[error("stream endpoint returned status {0}")]
    UnexpectedStatus(u16),

    /// The connector was closed before the request completed.
    #[error("connector closed")]
    Closed,
}

struct Inner {
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
    target: StreamTarget,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    state: RwLock<ConnectorState>,
}

/// A single streaming connection with automatic reconnection.
pub struct StreamConnector {
    inner: Arc<Inner>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl StreamConnector {
    /// Create a connector. Nothing is sent until [`start`](Self::start).
    #[must_use]
    pub fn new(
        credentials: Credentials,
        transport: Arc<dyn HttpTransport>,
        target: StreamTarget,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                credentials,
                transport,
                target,
                reconnect,
                cancel: CancellationToken::new(),
                state: RwLock::new(ConnectorState::Disconnected),
            }),
            reader: Mutex::new(None),
        }
    }

    /// Open the stream and spawn the reader task.
    ///
    /// Failures of this first request are returned to the caller; once it
    /// succeeds, every later failure is retried in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the endpoint answers with a
    /// status other than 200, or the connector is closed meanwhile.
    pub async fn start(&self, sink: mpsc::Sender<StreamRecord>) -> Result<(), StreamError> {
        if self.reader.lock().is_some() {
            tracing::debug!("Stream connector already started");
            return Ok(());
        }

        self.inner.set_state(ConnectorState::Connecting);
        let body = match self.inner.open().await {
            Ok(body) => body,
            Err(e) => {
                if !self.inner.cancel.is_cancelled() {
                    self.inner.set_state(ConnectorState::Disconnected);
                }
                return Err(e);
            }
        };
        if self.inner.cancel.is_cancelled() {
            return Err(StreamError::Closed);
        }
        self.inner.set_state(ConnectorState::Streaming);

        let inner = Arc::clone(&self.inner);
        *self.reader.lock() = Some(tokio::spawn(async move {
            inner.run(body, sink).await;
        }));

        Ok(())
    }

    /// Request the reader to stop and release the connection.
    ///
    /// Returns `true` if this call closed the connector, `false` if it was
    /// already closed.
    pub fn close(&self) -> bool {
        if self.inner.cancel.is_cancelled() {
            return false;
        }
        self.inner.cancel.cancel();
        self.inner.set_state(ConnectorState::Closed);
        tracing::info!(url = %self.inner.target.url, "Stream connector closed");
        true
    }

    /// Wait for the reader task to exit.
    ///
    /// Returns immediately if the reader was never started or has already
    /// been joined.
    pub async fn join(&self) {
        let handle = self.reader.lock().take();
        let Some(handle) = handle else {
            return;
        };
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Stream reader task failed");
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectorState {
        *self.inner.state.read()
    }

    /// Whether `close` has been requested.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// The connection target.
    #[must_use]
    pub fn target(&self) -> &StreamTarget {
        &self.inner.target
    }
}

impl Drop for StreamConnector {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl std::fmt::Debug for StreamConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnector")
            .field("url", &self.inner.target.url)
            .field("state", &self.state())
            .field("reader", &self.reader.lock().is_some())
            .finish_non_exhaustive()
    }
}

enum ReadOutcome {
    Cancelled,
    Failed(String),
    ConsumerGone,
}

enum Phase {
    Reading(LineReader),
    Reconnecting,
}

impl Inner {
    fn set_state(&self, state: ConnectorState) {
        let mut current = self.state.write();
        // Closed is terminal.
        if *current != ConnectorState::Closed {
            *current = state;
        }
    }

    fn signed_request(&self) -> PostRequest {
        let request = SignableRequest {
            method: "POST",
            url: &self.target.url,
            token: Some(&self.target.token),
            oauth_extra: &[],
            form: &self.target.form,
        };
        let authorization = Signer::new(&self.credentials)
            .authorization_header(&request, &ProtocolParameters::generate());

        PostRequest {
            url: self.target.url.clone(),
            headers: vec![
                ("Authorization".to_string(), authorization),
                ("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()),
            ],
            body: encode_form(&self.target.form),
        }
    }

    /// Sign and send the stream request; returns the body on 200.
    async fn open(&self) -> Result<ByteStream, StreamError> {
        if self.cancel.is_cancelled() {
            return Err(StreamError::Closed);
        }

        tracing::info!(url = %self.target.url, "Opening stream");
        let request = self.signed_request();

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(StreamError::Closed),
            response = self.transport.post(request) => response?,
        };

        if response.status != 200 {
            return Err(StreamError::UnexpectedStatus(response.status));
        }

        tracing::info!(url = %self.target.url, "Stream connected");
        Ok(response.body)
    }

    async fn run(&self, body: ByteStream, sink: mpsc::Sender<StreamRecord>) {
        let codec = LineCodec::new();
        let mut policy = ReconnectPolicy::new(self.reconnect.clone());
        let mut phase = Phase::Reading(StreamReader::new(body));

        loop {
            phase = match phase {
                Phase::Reading(mut reader) => match self.read_lines(&mut reader, &codec, &sink).await {
                    ReadOutcome::Cancelled => break,
                    ReadOutcome::ConsumerGone => {
                        tracing::info!("Record receiver dropped, stopping stream");
                        self.cancel.cancel();
                        self.set_state(ConnectorState::Closed);
                        break;
                    }
                    ReadOutcome::Failed(reason) => {
                        tracing::warn!(url = %self.target.url, error = %reason, "Stream read failed");
                        Phase::Reconnecting
                    }
                },
                Phase::Reconnecting => {
                    let delay = policy.next_delay();
                    let attempt = policy.attempt_count();
                    self.set_state(ConnectorState::Reconnecting { attempt });

                    tracing::info!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Reconnecting to stream"
                    );

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }

                    match self.open().await {
                        Ok(body) => {
                            policy.reset();
                            self.set_state(ConnectorState::Streaming);
                            Phase::Reading(StreamReader::new(body))
                        }
                        Err(StreamError::Closed) => break,
                        Err(e) => {
                            tracing::warn!(attempt, error = %e, "Stream reconnect failed");
                            Phase::Reconnecting
                        }
                    }
                }
            };
        }

        tracing::debug!(url = %self.target.url, "Stream reader exited");
    }

    async fn read_lines(
        &self,
        reader: &mut LineReader,
        codec: &LineCodec,
        sink: &mpsc::Sender<StreamRecord>,
    ) -> ReadOutcome {
        let mut line = Vec::with_capacity(4096);

        loop {
            line.clear();

            let mut limited = (&mut *reader).take(MAX_LINE_LENGTH as u64);
            let read = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return ReadOutcome::Cancelled,
                read = limited.read_until(b'\n', &mut line) => read,
            };

            match read {
                Ok(0) => return ReadOutcome::Failed("stream closed by peer".to_string()),
                Ok(n) if n == MAX_LINE_LENGTH && line.last() != Some(&b'\n') => {
                    return ReadOutcome::Failed(format!(
                        "line exceeds {MAX_LINE_LENGTH} bytes"
                    ));
                }
                Ok(_) => {}
                Err(e) => return ReadOutcome::Failed(e.to_string()),
            }

            match codec.decode(&line) {
                Ok(Frame::Record(record)) => {
                    let id = record.id();
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return ReadOutcome::Cancelled,
                        sent = sink.send(record) => {
                            if sent.is_err() {
                                return ReadOutcome::ConsumerGone;
                            }
                        }
                    }
                    tracing::trace!(id, "Delivered record");
                }
                Ok(Frame::KeepAlive) => tracing::trace!("Keep-alive"),
                Ok(Frame::Control) => {
                    tracing::debug!(bytes = line.len(), "Dropping line without record id");
                }
                Err(e) => tracing::debug!(error = %e, "Dropping undecodable line"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::application::ports::HttpResponse;

    struct Scripted {
        responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        requests: Mutex<Vec<PostRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for Scripted {
        async fn post(&self, request: PostRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().push(request);
            let next = self.responses.lock().pop_front();
            match next {
                Some(response) => response,
                None => std::future::pending().await,
            }
        }
    }

    fn body(lines: &[&'static str]) -> ByteStream {
        let chunks: Vec<std::io::Result<Bytes>> =
            lines.iter().map(|l| Ok(Bytes::from_static(l.as_bytes()))).collect();
        Box::pin(stream::iter(chunks))
    }

    fn ok(lines: &[&'static str]) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            body: body(lines),
        })
    }

    fn connector(transport: Arc<Scripted>) -> StreamConnector {
        let mut form = SignatureParameters::new();
        form.insert("follow".to_string(), "1,2".to_string());
        StreamConnector::new(
            Credentials::new("ck", "cs").unwrap(),
            transport,
            StreamTarget {
                url: "https://stream.example.com/site.json".to_string(),
                token: Token::new("at", "ats"),
                form,
            },
            ReconnectConfig::new(Duration::from_secs(10)),
        )
    }

    #[tokio::test]
    async fn request_is_signed_form_post() {
        let transport = Scripted::new(vec![ok(&[])]);
        let conn = connector(Arc::clone(&transport));
        let (tx, _rx) = mpsc::channel(8);

        assert_ok!(conn.start(tx).await);
        conn.close();
        conn.join().await;

        let requests = transport.requests.lock();
        let request = &requests[0];
        assert_eq!(request.body, "follow=1%2C2");
        assert_eq!(request.header("content-type"), Some(FORM_CONTENT_TYPE));
        let auth = request.header("authorization").unwrap();
        assert!(auth.starts_with("OAuth "));
        assert!(auth.contains("oauth_token=\"at\""));
        assert!(!auth.contains("follow"));
    }

    #[tokio::test]
    async fn initial_non_200_is_an_error() {
        let transport = Scripted::new(vec![Ok(HttpResponse {
            status: 401,
            body: body(&[]),
        })]);
        let conn = connector(transport);
        let (tx, _rx) = mpsc::channel(8);

        let err = assert_err!(conn.start(tx).await);
        assert!(matches!(err, StreamError::UnexpectedStatus(401)));
        assert_eq!(conn.state(), ConnectorState::Disconnected);
    }

    #[tokio::test]
    async fn initial_transport_error_is_surfaced() {
        let transport = Scripted::new(vec![Err(TransportError::Connection("refused".into()))]);
        let conn = connector(transport);
        let (tx, _rx) = mpsc::channel(8);

        assert!(matches!(
            conn.start(tx).await,
            Err(StreamError::Transport(TransportError::Connection(_)))
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let transport = Scripted::new(vec![ok(&[])]);
        let conn = connector(transport);
        let (tx, _rx) = mpsc::channel(8);
        assert_ok!(conn.start(tx).await);

        assert!(conn.close());
        assert!(!conn.close());
        conn.join().await;
        conn.join().await;
        assert_eq!(conn.state(), ConnectorState::Closed);
    }

    #[tokio::test]
    async fn close_before_start_fails_start() {
        let transport = Scripted::new(vec![ok(&[])]);
        let conn = connector(Arc::clone(&transport));
        let (tx, _rx) = mpsc::channel(8);

        conn.close();
        assert!(matches!(conn.start(tx).await, Err(StreamError::Closed)));
        assert!(transport.requests.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_resigns_with_fresh_nonce() {
        let transport = Scripted::new(vec![ok(&["{\"id\":1}\n"]), ok(&["{\"id\":2}\n"])]);
        let conn = connector(Arc::clone(&transport));
        let (tx, mut rx) = mpsc::channel(8);
        assert_ok!(conn.start(tx).await);

        assert_eq!(rx.recv().await.unwrap().id(), 1);
        assert_eq!(rx.recv().await.unwrap().id(), 2);

        conn.close();
        conn.join().await;

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_ne!(
            requests[0].header("authorization"),
            requests[1].header("authorization")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlong_line_reopens_stream() {
        let overlong: std::io::Result<Bytes> = Ok(Bytes::from(vec![b'x'; MAX_LINE_LENGTH + 1]));
        let transport = Scripted::new(vec![
            Ok(HttpResponse {
                status: 200,
                body: Box::pin(stream::iter(vec![
                    overlong,
                    Ok(Bytes::from_static(b"\n{\"id\":1}\n")),
                ])),
            }),
            ok(&["{\"id\":2}\n"]),
        ]);
        let conn = connector(Arc::clone(&transport));
        let (tx, mut rx) = mpsc::channel(8);
        assert_ok!(conn.start(tx).await);

        // Nothing after the overlong line is read from the first body.
        assert_eq!(rx.recv().await.unwrap().id(), 2);
        assert_eq!(transport.requests.lock().len(), 2);

        conn.close();
        conn.join().await;
    }

    #[tokio::test]
    async fn line_at_length_limit_is_accepted() {
        let mut frame = String::from("{\"id\":3,\"pad\":\"");
        frame.push_str(&"p".repeat(MAX_LINE_LENGTH - frame.len() - 3));
        frame.push_str("\"}\n");
        assert_eq!(frame.len(), MAX_LINE_LENGTH);

        let transport = Scripted::new(vec![Ok(HttpResponse {
            status: 200,
            body: Box::pin(stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(frame))])),
        })]);
        let conn = connector(transport);
        let (tx, mut rx) = mpsc::channel(8);
        assert_ok!(conn.start(tx).await);

        assert_eq!(rx.recv().await.unwrap().id(), 3);
        conn.close();
        conn.join().await;
    }

    #[tokio::test]
    async fn close_while_opening_fails_start() {
        let transport = Scripted::new(Vec::new());
        let conn = Arc::new(connector(Arc::clone(&transport)));
        let (tx, _rx) = mpsc::channel(8);

        let opener = tokio::spawn({
            let conn = Arc::clone(&conn);
            async move { conn.start(tx).await }
        });
        while transport.requests.lock().is_empty() {
            tokio::task::yield_now().await;
        }
        assert_eq!(conn.state(), ConnectorState::Connecting);

        assert!(conn.close());
        assert!(matches!(opener.await.unwrap(), Err(StreamError::Closed)));
        assert_eq!(conn.state(), ConnectorState::Closed);
    }

    #[tokio::test]
    async fn dropped_receiver_stops_reader() {
        let transport = Scripted::new(vec![ok(&["{\"id\":1}\n{\"id\":2}\n"])]);
        let conn = connector(transport);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        assert_ok!(conn.start(tx).await);
        conn.join().await;
        assert!(conn.is_closed());
        assert_eq!(conn.state(), ConnectorState::Closed);
    }
}
