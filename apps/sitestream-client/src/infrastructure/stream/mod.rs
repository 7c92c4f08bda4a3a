//! Streaming Adapters
//!
//! - **Codec**: newline-delimited JSON frames to [`StreamRecord`](crate::domain::record::StreamRecord)s
//! - **Reconnect**: fixed-interval retry policy
//! - **Connector**: signed long-lived POST plus background reader

pub mod codec;
pub mod connector;
pub mod reconnect;

pub use codec::{CodecError, Frame, LineCodec};
pub use connector::{ConnectorState, FORM_CONTENT_TYPE, StreamConnector, StreamError, StreamTarget};
pub use reconnect::{DEFAULT_RETRY_INTERVAL, ReconnectConfig, ReconnectPolicy};
