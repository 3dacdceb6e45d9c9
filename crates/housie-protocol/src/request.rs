//! Client → server messages.
//!
//! Every inbound frame is one JSON object: the envelope fields
//! (`requestId`, `timestamp`) sit next to the `type` tag and the
//! variant's own fields.
//!
//! ```json
//! { "type": "MARK_NUMBER", "requestId": "r-17", "timestamp": 1700000000000,
//!   "roomId": 3, "playerId": 12, "number": 42 }
//! ```
//!
//! Unknown `type` values fail to decode, so the set of requests is closed.

use serde::{Deserialize, Serialize};

use crate::types::{CallMode, Pattern, PlayerId, RoomId, RoomOptions};

/// A decoded client frame: envelope plus the typed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    /// Client-chosen correlation id. Echoed on the direct reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Client clock, milliseconds since the epoch.
    pub timestamp: u64,
    #[serde(flatten)]
    pub request: Request,
}

/// Every command a client can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    /// Must be the first request on a connection. The token is handed to the
    /// server's authenticator.
    Authenticate { token: String },

    CreateRoom {
        game_type: String,
        stake: u64,
        admin_id: PlayerId,
        #[serde(default)]
        options: RoomOptions,
    },

    JoinRoom {
        room_id: RoomId,
        player_id: PlayerId,
        name: String,
        phone: String,
        stake: u64,
        #[serde(default)]
        password: Option<String>,
    },

    LeaveRoom {
        room_id: RoomId,
        player_id: PlayerId,
    },

    StartGame {
        room_id: RoomId,
        admin_id: PlayerId,
    },

    /// Manual draw. Rejected while the room is in automatic mode.
    CallNumber {
        room_id: RoomId,
        admin_id: PlayerId,
    },

    MarkNumber {
        room_id: RoomId,
        player_id: PlayerId,
        number: u8,
    },

    ClaimPattern {
        room_id: RoomId,
        player_id: PlayerId,
        pattern: Pattern,
    },

    SetCallMode {
        room_id: RoomId,
        admin_id: PlayerId,
        mode: CallMode,
    },

    EndGame {
        room_id: RoomId,
        admin_id: PlayerId,
    },

    /// Takes `amount` out of the player's balance.
    Withdraw {
        room_id: RoomId,
        player_id: PlayerId,
        amount: u64,
    },

    /// Lobby listing of public rooms that still accept players.
    ListRooms,

    /// Liveness probe. The reply echoes the envelope timestamp.
    Ping,
}

impl Request {
    /// The wire name of this request, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Authenticate { .. } => "AUTHENTICATE",
            Request::CreateRoom { .. } => "CREATE_ROOM",
            Request::JoinRoom { .. } => "JOIN_ROOM",
            Request::LeaveRoom { .. } => "LEAVE_ROOM",
            Request::StartGame { .. } => "START_GAME",
            Request::CallNumber { .. } => "CALL_NUMBER",
            Request::MarkNumber { .. } => "MARK_NUMBER",
            Request::ClaimPattern { .. } => "CLAIM_PATTERN",
            Request::SetCallMode { .. } => "SET_CALL_MODE",
            Request::EndGame { .. } => "END_GAME",
            Request::Withdraw { .. } => "WITHDRAW",
            Request::ListRooms => "LIST_ROOMS",
            Request::Ping => "PING",
        }
    }

    /// The room this request targets, if it targets one.
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Request::JoinRoom { room_id, .. }
            | Request::LeaveRoom { room_id, .. }
            | Request::StartGame { room_id, .. }
            | Request::CallNumber { room_id, .. }
            | Request::MarkNumber { room_id, .. }
            | Request::ClaimPattern { room_id, .. }
            | Request::SetCallMode { room_id, .. }
            | Request::EndGame { room_id, .. }
            | Request::Withdraw { room_id, .. } => Some(*room_id),
            Request::Authenticate { .. }
            | Request::CreateRoom { .. }
            | Request::ListRooms
            | Request::Ping => None,
        }
    }
}
