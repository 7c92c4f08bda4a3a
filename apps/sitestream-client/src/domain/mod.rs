//! Domain Layer - Core stream types.
//!
//! This layer contains the value types the rest of the crate passes
//! around: decoded stream records and OAuth token pairs. Nothing here
//! performs I/O.

/// Decoded stream records.
pub mod record;

/// OAuth token pairs (request and access tokens).
pub mod token;
