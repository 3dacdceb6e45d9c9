//! Rooms for Housie: tickets, game rules, room actors, and the manager.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its seats,
//! tickets, number caller, and draw timer. Everything that changes a room
//! goes through that task's queue.
//!
//! # Key types
//!
//! - [`RoomManager`] — creates/archives rooms, routes requests, one room per player
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`RoomGame`] — the synchronous rules of one room
//! - [`TicketEngine`] — ticket generation and pattern matching
//! - [`GameConfig`] — game types, stakes, and payout multipliers
//! - [`Persistence`] — where rooms write their records ([`MemoryStore`] by default)

mod config;
mod error;
mod manager;
mod player;
mod room;
mod state;
mod store;
mod ticket;

pub use config::{ConfigError, GameConfig, GameTypeConfig};
pub use error::RoomError;
pub use manager::RoomManager;
pub use player::Player;
pub use room::RoomHandle;
pub use state::{Audience, Effect, JoinOutcome, JoinRequest, RoomGame, RoomInfo};
pub use store::{MemoryStore, Payment, PaymentStatus, Persistence, StoreError};
pub use ticket::{column_band, MarkOutcome, Ticket, TicketEngine, COLUMNS, NUMBERS_PER_TICKET, ROWS};
