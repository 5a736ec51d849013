//! Event-stream contract.
//!
//! The canonical event stream broadcasts every accepted [`Event`] as a
//! canonical-JSON payload. Streams are partition-ordered per shard: each
//! published message carries a per-shard sequence number so that consumers
//! can chain reads and producers can order writes.
//!
//! Transports (message buses, in-memory fan-out) implement [`EventStream`];
//! consumption is pull-based: a consumer remembers the last sequence number
//! it has applied and asks for everything after it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Event;

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors raised by event-stream transports.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The payload could not be serialized or deserialized.
    #[error("bad event payload: {message}")]
    Payload { message: String },

    /// The transport failed.
    #[error("stream transport error: {message}")]
    Transport { message: String },
}

impl StreamError {
    pub fn payload(err: impl std::fmt::Display) -> Self {
        Self::Payload {
            message: err.to_string(),
        }
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// An event with its position in a shard-ordered stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    /// The shard (partition) the event was published to.
    pub shard: String,

    /// Position within the shard, starting at 1 and contiguous.
    pub sequence: u64,

    pub event: Event,
}

/// A partition-ordered event transport.
pub trait EventStream: Send + Sync {
    /// Publish an event to its shard; returns the sequenced envelope.
    fn emit(&self, event: &Event) -> StreamResult<SequencedEvent>;

    /// Read the events of a shard with sequence numbers greater than
    /// `after`, in sequence order. `after = 0` reads from the beginning.
    fn read_from(&self, shard: &str, after: u64) -> StreamResult<Vec<SequencedEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_error_display() {
        let e = StreamError::payload("missing field `identifier`");
        assert!(e.to_string().contains("bad event payload"));
    }
}
