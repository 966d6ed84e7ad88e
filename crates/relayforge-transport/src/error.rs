/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone; the operation was attempted on a closed connection.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing to the peer failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading from the peer failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting a socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The configured upgrade path cannot be routed.
    #[error("invalid websocket path: {0:?}")]
    InvalidPath(String),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
