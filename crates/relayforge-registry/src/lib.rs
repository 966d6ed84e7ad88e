//! Connection registry for Relayforge.
//!
//! The registry is the single source of truth for "who is connected":
//!
//! 1. **Identity** — every accepted connection gets an actor number from a
//!    counter that starts at 1 and never goes back.
//! 2. **Membership** — live connections are tracked until their handler
//!    unregisters them.
//! 3. **Snapshots** — broadcasters get a detached copy of the membership
//!    and send from that, never from the live map.
//!
//! # How it fits in the stack
//!
//! ```text
//! Handler (above)   ← enrolls, relays to others(), unregisters on close
//!     ↕
//! Registry (this crate)  ← maps ConnectionId → (connection, ActorNr)
//!     ↕
//! Transport / Protocol (below)  ← provide Connection and ActorNr
//! ```

mod registry;

pub use registry::{ConnectionRegistry, Registration};
