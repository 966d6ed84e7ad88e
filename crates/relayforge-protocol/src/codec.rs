//! Codec trait and the JSON implementation.
//!
//! A codec converts between message types and the raw bytes a transport
//! connection carries. The relay only ever needs two directions: decode a
//! [`ClientMessage`] from a frame, and encode a [`ServerMessage`] once per
//! broadcast.
//!
//! [`ClientMessage`]: crate::ClientMessage
//! [`ServerMessage`]: crate::ServerMessage

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do not
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that speaks UTF-8 JSON via `serde_json`.
///
/// ```rust
/// use relayforge_protocol::{ActorNr, ClientMessage, Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
///
/// let msg: ClientMessage = codec.decode(br#"{"event":"move","x":1}"#).unwrap();
/// let bytes = codec.encode(&msg.into_relay(ActorNr(1))).unwrap();
///
/// let relayed: ServerMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(relayed.event_name(), "event");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActorNr, ClientMessage, ServerMessage};

    #[test]
    fn test_encode_produces_utf8_json() {
        let bytes = JsonCodec.encode(&ServerMessage::join(ActorNr(1))).unwrap();
        let text = std::str::from_utf8(&bytes).expect("JSON is UTF-8");
        assert!(text.starts_with(r#"{"event":"join""#), "{text}");
    }

    #[test]
    fn test_decode_object_succeeds() {
        let msg: ClientMessage = JsonCodec.decode(br#"{"event":"move"}"#).unwrap();
        assert_eq!(msg.code(), "move");
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<ClientMessage, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_invalid_utf8_returns_decode_error() {
        let result: Result<ClientMessage, _> = JsonCodec.decode(&[0xff, 0x7b, 0x7d]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_array_returns_decode_error() {
        let result: Result<ClientMessage, _> = JsonCodec.decode(b"[1,2,3]");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
