//! Application Layer - Port definitions.
//!
//! This layer defines how the client reaches the outside world without
//! committing to a concrete HTTP stack.

/// Port interfaces for external systems (HTTP transport).
pub mod ports;
