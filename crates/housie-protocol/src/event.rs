//! Server → client messages.
//!
//! Each event goes out inside an [`Outbound`] envelope carrying a
//! per-connection sequence number. `requestId` is present only on the copy
//! sent to the connection whose request caused the event.

use serde::{Deserialize, Serialize};

use crate::code::ErrorCode;
use crate::types::{PlayerId, PlayerView, RoomId, RoomListEntry, RoomSnapshot, WinnerRecord};

/// An encoded-ready server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outbound {
    /// Strictly increasing per connection, starting at 1.
    pub seq: u64,
    /// Server clock, milliseconds since the epoch.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub event: Event,
}

/// Everything the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    /// Reply to `AUTHENTICATE`.
    Authenticated {
        player_id: PlayerId,
        is_admin: bool,
        server_time: u64,
    },

    /// Full room snapshot. Sent on every lifecycle change, seat change,
    /// mode change, and in reply to room-mutating requests.
    RoomUpdate { room: Box<RoomSnapshot> },

    /// Reply to `LIST_ROOMS`.
    RoomList { rooms: Vec<RoomListEntry> },

    /// A number was drawn. `sequence` is 1-based.
    NumberCalled {
        room_id: RoomId,
        number: u8,
        sequence: usize,
        remaining: usize,
    },

    /// A player's private view. Only ever sent to that player.
    PlayerUpdate {
        room_id: RoomId,
        player: Box<PlayerView>,
    },

    WinnerDeclared {
        room_id: RoomId,
        winner: WinnerRecord,
    },

    /// A rejected request. Goes only to the requesting connection.
    Error { code: ErrorCode, message: String },

    Pong { client_time: u64, server_time: u64 },
}

impl Event {
    /// Shorthand for building an [`Event::Error`].
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Event::Error {
            code,
            message: message.into(),
        }
    }

    /// The wire name of this event, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Authenticated { .. } => "AUTHENTICATED",
            Event::RoomUpdate { .. } => "ROOM_UPDATE",
            Event::RoomList { .. } => "ROOM_LIST",
            Event::NumberCalled { .. } => "NUMBER_CALLED",
            Event::PlayerUpdate { .. } => "PLAYER_UPDATE",
            Event::WinnerDeclared { .. } => "WINNER_DECLARED",
            Event::Error { .. } => "ERROR",
            Event::Pong { .. } => "PONG",
        }
    }
}
