//! Core protocol types shared by requests and events.
//!
//! Everything here travels "on the wire": identities, the room lifecycle,
//! win patterns, call modes, and the snapshots the server pushes to clients.
//! Field names are camelCase on the wire to suit JavaScript clients.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player (or an admin — admins are players with
/// an admin flag on their authenticated identity).
///
/// Newtype wrapper so a `RoomId` can never be passed where a `PlayerId` is
/// expected. `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a room (one game of Housie).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Milliseconds since the Unix epoch. Every message and record timestamp
/// uses this clock.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// A named win condition over ticket cells.
///
/// - `EarlyFive`: any five marked cells.
/// - `TopLine` / `MiddleLine` / `BottomLine`: all five cells of that row.
/// - `Corners`: first and last number of the top and bottom rows.
/// - `FullHouse`: all fifteen cells.
///
/// Serialized as `snake_case` strings (`"full_house"`), which also makes
/// patterns usable as JSON map keys in game configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    EarlyFive,
    TopLine,
    MiddleLine,
    BottomLine,
    Corners,
    FullHouse,
}

impl Pattern {
    /// Every pattern, in payout-table order.
    pub const ALL: [Pattern; 6] = [
        Pattern::EarlyFive,
        Pattern::TopLine,
        Pattern::MiddleLine,
        Pattern::BottomLine,
        Pattern::Corners,
        Pattern::FullHouse,
    ];

    /// The ticket row a line pattern covers, if this is a line pattern.
    pub fn line_row(self) -> Option<usize> {
        match self {
            Pattern::TopLine => Some(0),
            Pattern::MiddleLine => Some(1),
            Pattern::BottomLine => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pattern::EarlyFive => "early five",
            Pattern::TopLine => "top line",
            Pattern::MiddleLine => "middle line",
            Pattern::BottomLine => "bottom line",
            Pattern::Corners => "corners",
            Pattern::FullHouse => "full house",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Call mode
// ---------------------------------------------------------------------------

/// How numbers get drawn in a room. Exactly one mode is active at a time.
///
/// ```json
/// { "kind": "manual" }
/// { "kind": "automatic", "intervalMs": 5000 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CallMode {
    /// The admin sends `CALL_NUMBER` for every draw.
    #[default]
    Manual,
    /// The room draws on its own every `interval_ms` while `Active`.
    Automatic {
        #[serde(rename = "intervalMs")]
        interval_ms: u64,
    },
}

impl CallMode {
    pub fn is_automatic(&self) -> bool {
        matches!(self, CallMode::Automatic { .. })
    }
}

// ---------------------------------------------------------------------------
// Room lifecycle
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// Transitions are strictly ordered — no skipping states:
///
/// ```text
/// Created → Waiting → Active → Ended → Archived
/// ```
///
/// - **Created**: the room actor exists but hasn't announced itself yet.
/// - **Waiting**: accepting players; the admin hasn't started the game.
/// - **Active**: numbers are being called; players mark and claim.
/// - **Ended**: terminal for gameplay. Snapshot still readable.
/// - **Archived**: handed off to persistence and dropped from routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomState {
    Created,
    Waiting,
    Active,
    Ended,
    Archived,
}

impl RoomState {
    /// Returns `true` if new players may take a seat.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting | Self::Active)
    }

    /// Returns `true` while numbers are being called.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` once gameplay is over for good.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Ended | Self::Archived)
    }

    /// The only state reachable from this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Waiting),
            Self::Waiting => Some(Self::Active),
            Self::Active => Some(Self::Ended),
            Self::Ended => Some(Self::Archived),
            Self::Archived => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Waiting => write!(f, "Waiting"),
            Self::Active => write!(f, "Active"),
            Self::Ended => write!(f, "Ended"),
            Self::Archived => write!(f, "Archived"),
        }
    }
}

/// Why a room ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Every number in the pool was called.
    PoolExhausted,
    /// Every pattern offered by the game type has a winner.
    AllPatternsWon,
    /// The admin sent `END_GAME`.
    AdminEnded,
    /// The room's actor hit an unexpected fault.
    InternalError,
}

// ---------------------------------------------------------------------------
// Room options
// ---------------------------------------------------------------------------

/// Per-room options supplied with `CREATE_ROOM`. Every field is optional on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomOptions {
    /// Public rooms accept anyone; private rooms require `password`.
    pub public: bool,
    pub password: Option<String>,
    /// Seat cap for this room. Clamped to the server-wide maximum.
    pub max_players: Option<usize>,
    pub call_mode: CallMode,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            public: true,
            password: None,
            max_players: None,
            call_mode: CallMode::Manual,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// A player's ticket as the owner sees it: numbers plus mark bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketView {
    /// `rows[r][c]` is the number in row `r`, column `c`, or `null`.
    pub rows: [[Option<u8>; 9]; 3],
    pub marked: [[bool; 9]; 3],
}

/// One line of the room's seat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub name: String,
    pub marked: usize,
    pub won_amount: u64,
}

/// Everything a player may see about themselves, sent only to that player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub name: String,
    pub phone: String,
    pub room_id: Option<RoomId>,
    pub stake: u64,
    pub payment: u64,
    pub won_amount: u64,
    pub withdrawn: u64,
    pub balance: u64,
    pub ticket: Option<TicketView>,
    pub last_active: u64,
}

/// An immutable record of a pattern won in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    pub player_id: PlayerId,
    pub name: String,
    pub pattern: Pattern,
    pub amount: u64,
    pub timestamp: u64,
    /// The called numbers that prove the pattern.
    pub winning_numbers: Vec<u8>,
}

/// The full public state of a room, pushed as `ROOM_UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub game_type: String,
    pub stake: u64,
    pub state: RoomState,
    pub admin_id: Option<PlayerId>,
    pub public: bool,
    pub max_players: usize,
    pub call_mode: CallMode,
    pub patterns: Vec<Pattern>,
    pub players: Vec<PlayerSummary>,
    /// Every number called so far, in draw order.
    pub called_numbers: Vec<u8>,
    pub remaining: usize,
    pub winners: Vec<WinnerRecord>,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub end_reason: Option<EndReason>,
}

/// A summary of a room returned in lobby listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListEntry {
    pub room_id: RoomId,
    pub game_type: String,
    pub stake: u64,
    pub state: RoomState,
    pub player_count: usize,
    pub max_players: usize,
}
