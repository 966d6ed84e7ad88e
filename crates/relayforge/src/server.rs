//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a relay. It ties the layers together:
//! transport → protocol → registry → per-connection handler.

use std::future::{self, Future};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relayforge_protocol::{Codec, JsonCodec, ServerMessage};
use relayforge_registry::ConnectionRegistry;
use relayforge_transport::{Transport, TransportError, WebSocketConnection, WebSocketTransport};

use crate::broadcast::{self, Delivery};
use crate::handler::handle_connection;
use crate::{RelayConfig, RelayConnection, RelayError};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so every task holds the same registry. The registry
/// locks internally, so nothing here needs an outer lock.
pub(crate) struct ServerState<C> {
    pub(crate) registry: ConnectionRegistry<C>,
    pub(crate) codec: JsonCodec,
    pub(crate) send_timeout: Duration,
}

impl<C: RelayConnection> ServerState<C> {
    pub(crate) fn new(send_timeout: Duration) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            codec: JsonCodec,
            send_timeout,
        }
    }

    /// Encodes `msg` and sends it to a single connection.
    pub(crate) async fn send_to(&self, conn: &C, msg: &ServerMessage) -> Result<(), RelayError> {
        let payload = self.codec.encode(msg)?;
        broadcast::deliver(conn, &payload, self.send_timeout).await
    }

    /// Encodes `msg` once and fans it out to `recipients`.
    pub(crate) async fn broadcast(&self, recipients: &[Arc<C>], msg: &ServerMessage) -> Delivery {
        if recipients.is_empty() {
            return Delivery::default();
        }
        match self.codec.encode(msg) {
            Ok(payload) => broadcast::broadcast(recipients, &payload, self.send_timeout).await,
            Err(e) => {
                tracing::warn!(event = msg.event_name(), error = %e, "failed to encode broadcast");
                Delivery::default()
            }
        }
    }
}

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use relayforge::RelayServer;
///
/// # async fn start() -> Result<(), relayforge::RelayError> {
/// let server = RelayServer::builder()
///     .bind("127.0.0.1:9000")
///     .ws_path("/lobby")
///     .send_timeout(Duration::from_secs(2))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RelayServerBuilder {
    config: RelayConfig,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Only accept WebSocket upgrades on `path`.
    pub fn ws_path(mut self, path: &str) -> Self {
        self.config.ws_path = Some(path.to_string());
        self
    }

    /// Accept WebSocket upgrades on any path.
    pub fn any_ws_path(mut self) -> Self {
        self.config.ws_path = None;
        self
    }

    /// Sets how long a single send to a single peer may take.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listening socket and returns a server ready to
    /// [`run`](RelayServer::run).
    pub async fn build(self) -> Result<RelayServer, RelayError> {
        let transport =
            WebSocketTransport::bind_with(&self.config.bind_addr, self.config.listener_options())
                .await?;

        let state = Arc::new(ServerState::new(self.config.send_timeout));

        Ok(RelayServer { transport, state })
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct RelayServer {
    transport: WebSocketTransport,
    state: Arc<ServerState<WebSocketConnection>>,
}

impl RelayServer {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Returns a handle that reports how many actors are connected.
    ///
    /// The handle stays valid after the server is moved into
    /// [`run`](Self::run).
    pub fn actor_count(&self) -> ActorCount {
        ActorCount(Arc::clone(&self.state))
    }

    /// Runs the accept loop until the transport shuts down.
    pub async fn run(self) -> Result<(), RelayError> {
        self.run_until(future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted connection gets its own handler task. Once `shutdown`
    /// resolves no new connections are accepted; connections already
    /// accepted keep running until their peers disconnect.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr(), "relay listening");
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => None,
                accepted = self.transport.accept() => Some(accepted),
            };

            match accepted {
                None => {
                    tracing::info!("shutdown requested, no longer accepting");
                    self.transport.shutdown().await?;
                    break;
                }
                Some(Ok(conn)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let reason = handle_connection(Arc::new(conn), state).await;
                        tracing::debug!(?reason, "connection handler finished");
                    });
                }
                Some(Err(TransportError::Shutdown)) => break,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        Ok(())
    }
}

/// Live count of registered actors, detached from the server value.
#[derive(Clone)]
pub struct ActorCount(Arc<ServerState<WebSocketConnection>>);

impl ActorCount {
    /// Number of connections currently registered.
    pub fn get(&self) -> usize {
        self.0.registry.len()
    }
}
