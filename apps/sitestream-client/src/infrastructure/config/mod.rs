//! Configuration Module
//!
//! Environment-driven configuration for the site-stream client.

mod settings;

pub use settings::{ClientConfig, ConfigError, Endpoints, StreamSettings};
