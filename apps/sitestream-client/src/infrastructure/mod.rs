//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration loaded from the environment.
pub mod config;

/// reqwest implementation of the HTTP transport port.
pub mod http;

/// OAuth1.0a credentials, signing and token exchange.
pub mod oauth;

/// Streaming connector, line codec and reconnect policy.
pub mod stream;

/// OpenTelemetry tracing integration.
pub mod telemetry;
