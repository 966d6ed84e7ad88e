//! The connection registry: which connections are live, and as which actor.
//!
//! # Concurrency note
//!
//! Unlike a manager that is wrapped in a lock by its owner, the registry
//! carries its own `parking_lot::Mutex`. Every connection task touches it,
//! each operation is a short map update or copy, and none of them await, so
//! a synchronous lock is both cheaper and usable from `Drop`. Callers never
//! iterate the live map; they get a snapshot and send from that.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use relayforge_protocol::ActorNr;
use relayforge_transport::{Connection, ConnectionId};

/// One registry entry: a live connection and the actor number it was given.
pub struct Registration<C> {
    /// Shared handle used to send to this peer.
    pub connection: Arc<C>,
    /// The identity announced to other peers.
    pub actor_nr: ActorNr,
}

// Manual impl: cloning only bumps the `Arc`, so `C` need not be `Clone`.
impl<C> Clone for Registration<C> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            actor_nr: self.actor_nr,
        }
    }
}

impl<C: Connection> fmt::Debug for Registration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("connection", &self.connection.id())
            .field("actor_nr", &self.actor_nr)
            .finish()
    }
}

/// Tracks every live connection and mints actor numbers.
///
/// ## Lifecycle
///
/// ```text
/// accept ──→ register()/enroll() ──→ snapshot()/others() ──→ unregister()
///                  │                                              │
///                  ▼                                              ▼
///        actor number minted                            entry removed;
///        (1, 2, 3, … never reused)                      number retired
/// ```
pub struct ConnectionRegistry<C> {
    inner: Mutex<Inner<C>>,
}

struct Inner<C> {
    /// Live entries keyed by the transport's connection id.
    entries: HashMap<ConnectionId, Registration<C>>,

    /// The next actor number to hand out. Only ever incremented.
    next_actor: u64,
}

impl<C: Connection> ConnectionRegistry<C> {
    /// Creates an empty registry. The first actor number issued is 1.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_actor: 1,
            }),
        }
    }

    /// Registers a connection and returns its newly minted actor number.
    ///
    /// Registering a connection that is already present mints nothing and
    /// returns the actor number it already has.
    pub fn register(&self, connection: Arc<C>) -> ActorNr {
        self.inner.lock().insert(connection)
    }

    /// Registers a connection and, in the same critical section, captures
    /// every other registered connection.
    ///
    /// The returned peers are exactly the connections that were registered
    /// before this one and are still live, ordered by actor number.
    pub fn enroll(&self, connection: Arc<C>) -> (ActorNr, Vec<Registration<C>>) {
        let id = connection.id();
        let mut inner = self.inner.lock();
        let actor_nr = inner.insert(connection);
        let peers = inner.collect(Some(id));
        (actor_nr, peers)
    }

    /// Removes a connection, returning the actor number it had.
    ///
    /// Returns `None` (and does nothing) if the connection is not
    /// registered, so a repeated cleanup is harmless.
    pub fn unregister(&self, connection: &C) -> Option<ActorNr> {
        let id = connection.id();
        let removed = self.inner.lock().entries.remove(&id);
        match removed {
            Some(entry) => {
                tracing::debug!(conn_id = %id, actor_nr = %entry.actor_nr, "unregistered");
                Some(entry.actor_nr)
            }
            None => None,
        }
    }

    /// A point-in-time copy of every entry, ordered by actor number.
    ///
    /// The copy is detached from the registry: it can be iterated (and sent
    /// to) while connections keep coming and going.
    pub fn snapshot(&self) -> Vec<Registration<C>> {
        self.inner.lock().collect(None)
    }

    /// Every registered connection except `excluding`, ordered by actor
    /// number.
    pub fn others(&self, excluding: &C) -> Vec<Arc<C>> {
        self.inner
            .lock()
            .collect(Some(excluding.id()))
            .into_iter()
            .map(|entry| entry.connection)
            .collect()
    }

    /// Looks up the actor number of a registered connection.
    pub fn actor_nr(&self, connection: &C) -> Option<ActorNr> {
        self.inner
            .lock()
            .entries
            .get(&connection.id())
            .map(|entry| entry.actor_nr)
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns `true` if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl<C: Connection> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> Inner<C> {
    fn insert(&mut self, connection: Arc<C>) -> ActorNr {
        let id = connection.id();
        if let Some(existing) = self.entries.get(&id) {
            tracing::warn!(conn_id = %id, actor_nr = %existing.actor_nr, "connection already registered");
            return existing.actor_nr;
        }

        let actor_nr = ActorNr(self.next_actor);
        self.next_actor += 1;
        self.entries.insert(
            id,
            Registration {
                connection,
                actor_nr,
            },
        );

        tracing::debug!(conn_id = %id, %actor_nr, "registered");
        actor_nr
    }

    fn collect(&self, excluding: Option<ConnectionId>) -> Vec<Registration<C>> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|(id, _)| Some(**id) != excluding)
            .map(|(_, entry)| entry.clone())
            .collect();
        entries.sort_by_key(|entry| entry.actor_nr);
        entries
    }
}

// =========================================================================
// Tests
// =========================================================================
