//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding lobby messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound message failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// An inbound payload was not a well-formed message: invalid UTF-8,
    /// malformed JSON, or JSON that is not an object.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
