//! Stream Records
//!
//! A `StreamRecord` is one decoded data line from the streaming endpoint.
//! The provider owns the schema; the client only relies on a non-zero
//! integer `id` to tell data records apart from keep-alive and control lines.
//!
//! # Wire Format
//!
//! Site streams wrap every message in an envelope addressed to one of the
//! followed users:
//!
//! ```json
//! {"for_user": 1234, "message": {"id": 42, "text": "..."}}
//! ```
//!
//! Plain streams send the message object directly:
//!
//! ```json
//! {"id": 42, "text": "..."}
//! ```

use serde::{Deserialize, Serialize};

/// A decoded record with a non-zero identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    id: u64,
    for_user: Option<u64>,
    payload: serde_json::Value,
}

impl StreamRecord {
    /// Create a record.
    ///
    /// Returns `None` for identifier `0`, which the provider uses for
    /// control messages that must never reach a consumer.
    #[must_use]
    pub fn new(id: u64, for_user: Option<u64>, payload: serde_json::Value) -> Option<Self> {
        if id == 0 {
            return None;
        }
        Some(Self {
            id,
            for_user,
            payload,
        })
    }

    /// Message identifier (always non-zero).
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Followed user this message was routed to, when the line came
    /// wrapped in a site-stream envelope.
    #[must_use]
    pub const fn for_user(&self) -> Option<u64> {
        self.for_user
    }

    /// The inner message object as sent by the provider.
    #[must_use]
    pub const fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Consume the record and return the inner message object.
    #[must_use]
    pub fn into_payload(self) -> serde_json::Value {
        self.payload
    }
}
