//! # Relayforge
//!
//! A WebSocket lobby relay for multiplayer web games.
//!
//! Every connection is given an actor number. Clients learn who else is in
//! the lobby through `join`, `actorJoin` and `actorLeave` events, and any
//! JSON object a client sends is relayed to every other client inside an
//! `event` envelope, stamped with the sender's actor number. The server
//! keeps no game state of its own.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relayforge::prelude::*;
//!
//! # async fn start() -> Result<(), RelayError> {
//! let server = RelayServer::builder()
//!     .bind("0.0.0.0:8765")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod broadcast;
mod config;
mod error;
mod handler;
mod server;
#[cfg(test)]
mod testing;

pub use config::{DEFAULT_PORT, RelayConfig};
pub use error::RelayError;
pub use server::{ActorCount, RelayServer, RelayServerBuilder};

use relayforge_transport::{Connection, TransportError};

/// A connection the relay can drive: any [`Connection`] whose failures are
/// reported as [`TransportError`].
pub(crate) trait RelayConnection: Connection<Error = TransportError> {}

impl<T: Connection<Error = TransportError>> RelayConnection for T {}

/// Everything needed to run a relay and speak its wire format.
pub mod prelude {
    pub use crate::{DEFAULT_PORT, RelayConfig, RelayError, RelayServer, RelayServerBuilder};
    pub use relayforge_protocol::{
        ActorNr, ActorRef, ClientMessage, Codec, JoinAck, JsonCodec, RelayedEvent,
        ServerMessage,
    };
}
