#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Site Stream Client - OAuth1.0a Signed Streaming
//!
//! A client for a provider's long-lived streaming API: it signs requests
//! with OAuth1.0a HMAC-SHA1, runs the three-legged token exchange, and
//! keeps one newline-delimited JSON stream open, reconnecting on a fixed
//! interval until closed.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Value types with no I/O
//!   - `record`: Stream records (identifier, owning user, raw payload)
//!   - `token`: Request and access tokens
//!
//! - **Application**: Port definitions
//!   - `ports`: The HTTP transport the adapters are written against
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `oauth`: Credentials, signer, token exchange
//!   - `stream`: Line codec, reconnect policy, stream connector
//!   - `http`: reqwest transport
//!   - `config`: Environment configuration
//!   - `telemetry`: Tracing subscriber and OTLP export
//!
//! - **Client**: The [`OAuthClient`] facade tying the above together
//!
//! # Data Flow
//!
//! ```text
//!                 signed POST               lines            records
//! OAuthClient ───────────────▶ Provider ──────────▶ Connector ──────▶ mpsc ──▶ consumer
//!      ▲                                              │
//!      └────────── close / replace ───────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core value types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Client facade.
pub mod client;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::record::StreamRecord;
pub use domain::token::{AccessToken, RequestToken, Token};

// Ports
pub use application::ports::{ByteStream, HttpResponse, HttpTransport, PostRequest, TransportError};

// Client
pub use client::{ClientError, OAuthClient};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, Endpoints, StreamSettings};

// OAuth
pub use infrastructure::oauth::{Credentials, OAuthError, ProtocolParameters, Signer};

// Streaming
pub use infrastructure::stream::{ConnectorState, ReconnectConfig, StreamConnector, StreamError};

// HTTP
pub use infrastructure::http::ReqwestTransport;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
