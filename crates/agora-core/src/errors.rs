//! Codec error type.

use thiserror::Error;

/// Errors produced by the envelope codec.
///
/// None of these is fatal to a session: the read pump logs them and keeps
/// reading.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not a JSON object with a string `type`.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The `type` is recognized but its payload does not have the expected shape.
    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        /// The recognized kind.
        kind: &'static str,
        /// The underlying deserialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// An outbound message could not be serialized.
    #[error("failed to encode `{kind}` message: {source}")]
    Encode {
        /// Kind of the message being encoded.
        kind: &'static str,
        /// The underlying serialization failure.
        #[source]
        source: serde_json::Error,
    },
}

impl CodecError {
    /// Short machine-readable label, used as a metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::Encode { .. } => "encode",
        }
    }
}
