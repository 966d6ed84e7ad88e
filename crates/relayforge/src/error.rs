//! Unified error type for the relay.

use relayforge_protocol::ProtocolError;
use relayforge_transport::{ConnectionId, TransportError};

/// Top-level error that wraps the sub-crate errors.
///
/// The `#[from]` attributes let `?` convert transport and protocol errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A single send did not complete within the configured send timeout.
    #[error("send to {0} timed out")]
    SendTimeout(ConnectionId),
}
