//! Envelope codec.
//!
//! Stateless transform between socket bytes and typed values. Decoding goes
//! through a loose `{type, payload}` shape first so that unknown kinds still
//! decode (forward compatibility) while a recognized kind with a bad payload
//! is reported as [`CodecError::InvalidPayload`].

use serde::Deserialize;
use serde_json::Value;

use crate::errors::CodecError;
use crate::wire::{Inbound, Message, TypingRequest};

/// Loose envelope used as the first decoding stage.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Decode one inbound frame.
pub fn decode_inbound(bytes: &[u8]) -> Result<Inbound, CodecError> {
    let raw: RawEnvelope = serde_json::from_slice(bytes).map_err(CodecError::Malformed)?;

    match raw.kind.as_str() {
        "typing" => serde_json::from_value::<TypingRequest>(raw.payload)
            .map(Inbound::Typing)
            .map_err(|source| CodecError::InvalidPayload {
                kind: "typing",
                source,
            }),
        _ => Ok(Inbound::Unknown {
            kind: raw.kind,
            payload: raw.payload,
        }),
    }
}

/// Encode one outbound message as a JSON text frame.
pub fn encode_outbound(message: &Message) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(|source| CodecError::Encode {
        kind: message.kind(),
        source,
    })
}
