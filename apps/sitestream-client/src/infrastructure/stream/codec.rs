//! Stream Line Codec
//!
//! Decodes one newline-delimited frame of the stream body.
//!
//! - Blank frames are keep-alives.
//! - Objects without a usable `id` (friends lists, deletes, limit
//!   notices, `"id": 0`) are control messages.
//! - Everything else with a non-zero integer `id` is a data record.
//!
//! A frame that is not a JSON object is an error; callers drop the line
//! and keep the connection.

use serde_json::Value;

use crate::domain::record::StreamRecord;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed (including invalid UTF-8 and truncated frames).
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame decoded to something other than a JSON object.
    #[error("expected JSON object, got: {0}")]
    NotAnObject(&'static str),
}

/// Classification of a decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Whitespace-only line sent to keep the connection open.
    KeepAlive,
    /// Valid JSON with no deliverable identifier.
    Control,
    /// A data record to forward.
    Record(StreamRecord),
}

/// JSON line codec for the streaming endpoint.
#[derive(Debug, Default, Clone)]
pub struct LineCodec;

impl LineCodec {
    /// Create a new line codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one frame, with or without its trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object.
    pub fn decode(&self, frame: &[u8]) -> Result<Frame, CodecError> {
        let trimmed = frame.trim_ascii();
        if trimmed.is_empty() {
            return Ok(Frame::KeepAlive);
        }

        let value: Value = serde_json::from_slice(trimmed)?;
        let Value::Object(mut envelope) = value else {
            return Err(CodecError::NotAnObject(kind_of(&value)));
        };

        let (for_user, message) = match envelope.remove("message") {
            Some(Value::Object(inner)) => (
                envelope.get("for_user").and_then(Value::as_u64),
                Value::Object(inner),
            ),
            Some(other) => {
                envelope.insert("message".to_string(), other);
                (None, Value::Object(envelope))
            }
            None => (None, Value::Object(envelope)),
        };

        let id = message.get("id").and_then(Value::as_u64).unwrap_or(0);

        Ok(StreamRecord::new(id, for_user, message).map_or(Frame::Control, Frame::Record))
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn record(frame: &str) -> StreamRecord {
        match LineCodec::new().decode(frame.as_bytes()).unwrap() {
            Frame::Record(r) => r,
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test_case("" ; "empty")]
    #[test_case("\r\n" ; "crlf")]
    #[test_case("   \t \n" ; "whitespace")]
    fn blank_frames_are_keep_alives(frame: &str) {
        assert_eq!(
            LineCodec::new().decode(frame.as_bytes()).unwrap(),
            Frame::KeepAlive
        );
    }

    #[test_case(r#"{"id":0}"# ; "zero id")]
    #[test_case(r#"{"friends":[1,2,3]}"# ; "friends list")]
    #[test_case(r#"{"id":-5}"# ; "negative id")]
    #[test_case(r#"{"id":"42"}"# ; "string id")]
    #[test_case(r#"{"for_user":1,"message":{"id":0}}"# ; "zero id in envelope")]
    #[test_case(r#"{"for_user":1,"message":{"delete":{"status":{"id":9}}}}"# ; "delete notice")]
    fn frames_without_usable_id_are_control(frame: &str) {
        assert_eq!(
            LineCodec::new().decode(frame.as_bytes()).unwrap(),
            Frame::Control
        );
    }

    #[test]
    fn bare_object_is_record() {
        let r = record("{\"id\":42,\"text\":\"hello\"}\n");
        assert_eq!(r.id(), 42);
        assert_eq!(r.for_user(), None);
        assert_eq!(r.payload()["text"], "hello");
    }

    #[test]
    fn envelope_unwraps_message() {
        let r = record(r#"{"for_user":1234,"message":{"id":7,"text":"hi"}}"#);
        assert_eq!(r.id(), 7);
        assert_eq!(r.for_user(), Some(1234));
        assert_eq!(r.payload()["text"], "hi");
        assert!(r.payload().get("for_user").is_none());
    }

    #[test]
    fn non_object_message_field_is_kept_inline() {
        let r = record(r#"{"id":3,"message":"plain text"}"#);
        assert_eq!(r.id(), 3);
        assert_eq!(r.payload()["message"], "plain text");
    }

    #[test]
    fn large_ids_survive() {
        let r = record(r#"{"id":18446744073709551615}"#);
        assert_eq!(r.id(), u64::MAX);
    }

    #[test_case(b"{\"id\":4" ; "truncated")]
    #[test_case(b"not json" ; "garbage")]
    #[test_case(b"\xff\xfe{}" ; "invalid utf8")]
    fn malformed_frames_are_json_errors(frame: &[u8]) {
        assert!(matches!(
            LineCodec::new().decode(frame),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn arrays_are_rejected() {
        assert!(matches!(
            LineCodec::new().decode(b"[{\"id\":1}]"),
            Err(CodecError::NotAnObject("array"))
        ));
    }
}
