//! # Housie
//!
//! A real-time Housie (Tambola) game server. Admins open rooms, players
//! buy a ticket by staking into a room, numbers are drawn one at a time
//! (by the admin or on a timer), and the first valid claim on each pattern
//! is paid out.
//!
//! ## Layers
//!
//! ```text
//! housie            ← server loop, request dispatch, sweepers (this crate)
//!   housie-room     ← rooms as actors, tickets, rules, persistence seam
//!   housie-caller   ← draw pool and draw timer
//!   housie-session  ← auth hook, connection registry, broadcast bus
//!   housie-protocol ← wire types and codec
//!   housie-transport← WebSocket and in-memory connections
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use housie::prelude::*;
//!
//! struct DevAuth;
//!
//! impl Authenticator for DevAuth {
//!     async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
//!         let id = token
//!             .parse()
//!             .map_err(|_| SessionError::AuthFailed("not a number".into()))?;
//!         Ok(Identity::admin(PlayerId(id)))
//!     }
//! }
//!
//! # async fn start() -> Result<(), HousieError> {
//! let server = HousieServer::<DevAuth>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(DevAuth)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod machine;
mod payment;
mod server;
mod sweeper;

pub use error::{HousieError, PaymentError};
pub use handler::handle_connection;
pub use machine::GameStateMachine;
pub use payment::{AcceptAllPayments, PaymentGateway};
pub use server::{HousieServer, HousieServerBuilder, ServerConfig};
pub use sweeper::{spawn_heartbeat_sweeper, spawn_retention_sweeper};

pub mod prelude {
    //! The types most servers and tests need, in one import.

    pub use crate::{
        AcceptAllPayments, GameStateMachine, HousieError, HousieServer, PaymentError,
        PaymentGateway, ServerConfig,
    };
    pub use housie_protocol::{
        CallMode, Codec, ErrorCode, Event, Inbound, JsonCodec, Outbound, Pattern, PlayerId,
        Request, RoomId, RoomOptions, RoomSnapshot, RoomState,
    };
    pub use housie_room::{GameConfig, MemoryStore, Payment, PaymentStatus, Persistence, RoomManager};
    pub use housie_session::{
        Authenticator, BroadcastBus, ConnectionRegistry, Identity, RegistryConfig, SessionError,
    };
    pub use housie_transport::{Connection, MemoryConnection};
}
