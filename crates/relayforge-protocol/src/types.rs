//! Core protocol types for the lobby wire format.
//!
//! Every server → client message is an envelope of the shape
//! `{ "event": <name>, "data": { ... } }`, mirroring the lobby protocol that
//! game clients already speak. Clients send free-form JSON objects which the
//! server relays inside an `event` envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A participant's identity, called the "actor number" on the wire.
///
/// Assigned by the server when a connection is accepted. Actor numbers start
/// at 1, only ever grow, and are never handed out twice within one process.
///
/// `#[serde(transparent)]` keeps it a plain number in JSON: `ActorNr(3)`
/// becomes `3`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ActorNr(pub u64);

impl fmt::Display for ActorNr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Message bodies
// ---------------------------------------------------------------------------

/// Body of a `join` message: `{ "success": 1, "actorNr": n }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAck {
    /// Always `1`; clients check it as a truthy flag.
    pub success: u8,
    /// The identity assigned to the receiving connection.
    pub actor_nr: ActorNr,
}

impl JoinAck {
    /// A successful join for `actor_nr`.
    pub fn new(actor_nr: ActorNr) -> Self {
        Self {
            success: 1,
            actor_nr,
        }
    }
}

/// Body of `actorJoin` and `actorLeave`: `{ "actorNr": n }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRef {
    pub actor_nr: ActorNr,
}

/// Body of a relayed `event` message.
///
/// `code` is the `event` field of the client's original message (or `null`
/// if it had none), `data` is the whole original message with `sender`
/// forced to the relaying connection's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedEvent {
    pub code: Value,
    pub data: ClientMessage,
    pub sender: ActorNr,
}

// ---------------------------------------------------------------------------
// ServerMessage: the outbound envelope
// ---------------------------------------------------------------------------

/// A message sent from the server to a client.
///
/// `#[serde(tag = "event", content = "data")]` produces the adjacently
/// tagged envelope the clients expect:
///
/// ```text
/// { "event": "actorJoin", "data": { "actorNr": 2 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Sent once, only to a connection that just joined.
    Join(JoinAck),

    /// Another actor is present: either it just joined, or it was already
    /// connected when the receiver joined.
    ActorJoin(ActorRef),

    /// Another actor disconnected.
    ActorLeave(ActorRef),

    /// One client's message relayed to everyone else.
    Event(RelayedEvent),
}

impl ServerMessage {
    /// `{ "event": "join", "data": { "success": 1, "actorNr": n } }`
    pub fn join(actor_nr: ActorNr) -> Self {
        Self::Join(JoinAck::new(actor_nr))
    }

    /// `{ "event": "actorJoin", "data": { "actorNr": n } }`
    pub fn actor_join(actor_nr: ActorNr) -> Self {
        Self::ActorJoin(ActorRef { actor_nr })
    }

    /// `{ "event": "actorLeave", "data": { "actorNr": n } }`
    pub fn actor_leave(actor_nr: ActorNr) -> Self {
        Self::ActorLeave(ActorRef { actor_nr })
    }

    /// The wire name of this message's `event` tag.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::ActorJoin(_) => "actorJoin",
            Self::ActorLeave(_) => "actorLeave",
            Self::Event(_) => "event",
        }
    }
}

// ---------------------------------------------------------------------------
// ClientMessage: anything a client sends
// ---------------------------------------------------------------------------

/// A message received from a client: any JSON object.
///
/// The server does not interpret client messages beyond two fields: `event`
/// becomes the relayed envelope's `code`, and `sender` is overwritten. Any
/// other JSON value (array, number, string) fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientMessage(Map<String, Value>);

impl ClientMessage {
    /// Wraps an already-parsed JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns the value of a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The client's `event` field, or `null` when absent.
    pub fn code(&self) -> Value {
        self.0.get("event").cloned().unwrap_or(Value::Null)
    }

    /// Stamps `sender` and wraps the message for relaying.
    ///
    /// Whatever `sender` the client supplied is replaced; the relaying
    /// connection's identity is the only one peers ever see.
    pub fn into_relay(mut self, sender: ActorNr) -> ServerMessage {
        let code = self.code();
        self.0.insert("sender".to_string(), Value::from(sender.0));
        ServerMessage::Event(RelayedEvent {
            code,
            data: self,
            sender,
        })
    }

    /// Consumes the message, returning the underlying JSON object.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ClientMessage {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

// =========================================================================
// Tests
// =========================================================================
