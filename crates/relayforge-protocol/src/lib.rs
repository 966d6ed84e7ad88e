//! Wire protocol for Relayforge.
//!
//! This crate defines the "language" that clients and the relay speak:
//!
//! - **Types** ([`ServerMessage`], [`ClientMessage`], [`ActorNr`]) — the
//!   lobby envelopes that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! The protocol layer knows nothing about connections or the registry; it
//! only shapes messages.
//!
//! ```text
//! Transport (bytes) → Protocol (envelopes) → Registry / Handler (actors)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ActorNr, ActorRef, ClientMessage, JoinAck, RelayedEvent, ServerMessage,
};
