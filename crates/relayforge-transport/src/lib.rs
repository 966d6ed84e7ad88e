//! Transport abstraction layer for Relayforge.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the relay core
//! is written against, plus a WebSocket implementation that also answers
//! plain HTTP liveness checks on the same port.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport served by `axum`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{ListenerOptions, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
///
/// Assigned by the transport when a connection is accepted. Unique for the
/// lifetime of the transport that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops accepting new connections. Already accepted connections are
    /// left untouched.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that can send and receive messages.
///
/// All methods take `&self`: a connection is shared (behind an `Arc`)
/// between the task that reads from it and every task that broadcasts to
/// it. Implementations must let `send` proceed while another task is
/// parked in `recv`.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
