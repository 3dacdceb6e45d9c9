//! Connection tracking and delivery for Housie.
//!
//! 1. **Authentication** — turning a token into an [`Identity`]
//!    ([`Authenticator`] trait).
//! 2. **Connection tracking** — who is connected, which room they listen
//!    to, and whether they're still alive ([`ConnectionRegistry`]).
//! 3. **Broadcast** — ordered, non-blocking fan-out of room events
//!    ([`BroadcastBus`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)       ← publishes events through the bus
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol / Transport (below)  ← Event, PlayerId, ConnectionId
//! ```

mod auth;
mod bus;
mod error;
mod registry;

pub use auth::{Authenticator, Identity};
pub use bus::{BroadcastBus, Origin};
pub use error::SessionError;
pub use registry::{ConnectionRegistry, Delivery, Eviction, Outbox, RegistryConfig};
