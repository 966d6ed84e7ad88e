//! Per-connection handler: handshake, relay loop, and departure.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Enroll → actor number minted, current peers captured
//!   2. Handshake → `join` to self, `actorJoin` to peers, peers that are
//!      still connected replayed to self
//!   3. Loop: receive a JSON object → stamp `sender` → relay to everyone else
//!   4. Depart → unregister, `actorLeave` to the remaining peers, close

use std::sync::Arc;

use relayforge_protocol::{ActorNr, ClientMessage, Codec, ServerMessage};
use relayforge_transport::TransportError;

use crate::RelayConnection;
use crate::broadcast;
use crate::server::ServerState;

/// Why a handler stopped relaying.
#[derive(Debug)]
pub(crate) enum CloseReason {
    /// The client closed the connection.
    PeerClosed,
    /// Receiving failed; treated as a disconnect.
    Transport(TransportError),
}

/// Owns a connection's registry entry until the handler is done with it.
///
/// The normal path calls [`complete`](Self::complete), which announces the
/// departure and awaits it. If the handler task is aborted or unwinds
/// first, `Drop` unregisters synchronously and spawns the `actorLeave`
/// broadcast instead. Either way it happens once.
struct Departure<C: RelayConnection> {
    conn: Arc<C>,
    state: Arc<ServerState<C>>,
    completed: bool,
}

impl<C: RelayConnection> Departure<C> {
    fn new(conn: Arc<C>, state: Arc<ServerState<C>>) -> Self {
        Self {
            conn,
            state,
            completed: false,
        }
    }

    async fn complete(mut self) {
        self.completed = true;

        let Some(actor_nr) = self.state.registry.unregister(&self.conn) else {
            return;
        };
        let others = self.state.registry.others(&self.conn);
        let delivery = self
            .state
            .broadcast(&others, &ServerMessage::actor_leave(actor_nr))
            .await;
        tracing::trace!(%actor_nr, delivered = delivery.delivered, failed = delivery.failed, "actorLeave sent");

        match tokio::time::timeout(self.state.send_timeout, self.conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(conn_id = %self.conn.id(), error = %e, "close failed"),
            Err(_) => tracing::debug!(conn_id = %self.conn.id(), "close timed out"),
        }
    }
}

impl<C: RelayConnection> Drop for Departure<C> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }

        let Some(actor_nr) = self.state.registry.unregister(&self.conn) else {
            return;
        };
        tracing::info!(conn_id = %self.conn.id(), %actor_nr, "actor dropped");

        let others = self.state.registry.others(&self.conn);
        if others.is_empty() {
            return;
        }
        let payload = match self.state.codec.encode(&ServerMessage::actor_leave(actor_nr)) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%actor_nr, error = %e, "failed to encode actorLeave");
                return;
            }
        };

        let send_timeout = self.state.send_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    broadcast::broadcast(&others, &payload, send_timeout).await;
                });
            }
            Err(_) => {
                tracing::debug!(%actor_nr, "no runtime, actorLeave not sent");
            }
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: RelayConnection>(
    conn: Arc<C>,
    state: Arc<ServerState<C>>,
) -> CloseReason {
    let conn_id = conn.id();

    // --- Step 1: Enroll ---
    let (actor_nr, peers) = state.registry.enroll(Arc::clone(&conn));
    let departure = Departure::new(Arc::clone(&conn), Arc::clone(&state));
    tracing::info!(%conn_id, %actor_nr, peers = peers.len(), "actor connected");

    // --- Step 2: Handshake ---
    if let Err(e) = state.send_to(&conn, &ServerMessage::join(actor_nr)).await {
        tracing::debug!(%actor_nr, error = %e, "join not delivered");
    }

    let recipients: Vec<Arc<C>> = peers.iter().map(|p| Arc::clone(&p.connection)).collect();
    state
        .broadcast(&recipients, &ServerMessage::actor_join(actor_nr))
        .await;

    // A peer may have left while the broadcast above was in flight; its
    // actorLeave has then already gone out, so it is not replayed.
    let still_here = peers
        .iter()
        .filter(|peer| state.registry.actor_nr(&peer.connection).is_some());
    for peer in still_here {
        if let Err(e) = state
            .send_to(&conn, &ServerMessage::actor_join(peer.actor_nr))
            .await
        {
            tracing::debug!(%actor_nr, peer = %peer.actor_nr, error = %e, "actorJoin replay not delivered");
        }
    }

    // --- Step 3: Relay loop ---
    let reason = relay_loop(&conn, &state, actor_nr).await;

    // --- Step 4: Depart ---
    match &reason {
        CloseReason::PeerClosed => {
            tracing::info!(%conn_id, %actor_nr, "actor disconnected");
        }
        CloseReason::Transport(e) => {
            tracing::info!(%conn_id, %actor_nr, error = %e, "actor disconnected");
        }
    }
    departure.complete().await;

    reason
}

async fn relay_loop<C: RelayConnection>(
    conn: &Arc<C>,
    state: &ServerState<C>,
    actor_nr: ActorNr,
) -> CloseReason {
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => return CloseReason::PeerClosed,
            Err(e) => return CloseReason::Transport(e),
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(%actor_nr, error = %e, "invalid message format");
                continue;
            }
        };

        let others = state.registry.others(conn);
        let delivery = state.broadcast(&others, &msg.into_relay(actor_nr)).await;
        tracing::trace!(
            %actor_nr,
            delivered = delivery.delivered,
            failed = delivery.failed,
            "relayed"
        );
    }
}

// =========================================================================
// Tests
// =========================================================================
