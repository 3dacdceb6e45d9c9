//! Error types for the room layer.

use housie_protocol::{ErrorCode, Pattern, PlayerId, RoomId, RoomState};

/// Errors that can occur during room operations.
///
/// Every variant maps to one stable [`ErrorCode`] via [`RoomError::code`].
/// None of them leaves the room in a half-applied state: validation runs
/// before mutation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomId),

    #[error("unknown game type {0:?}")]
    InvalidGameType(String),

    #[error("stake {0} is not allowed here")]
    InvalidStake(u64),

    #[error("number {0} is outside the draw range")]
    InvalidNumber(u8),

    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room has issued as many tickets as it has seats.
    #[error("room {0} cannot issue more tickets")]
    CapacityExceeded(RoomId),

    #[error("room {0} is not accepting players ({1})")]
    NotJoinable(RoomId, RoomState),

    #[error("room {0} is private")]
    NotPublic(RoomId),

    #[error("wrong password for room {0}")]
    WrongPassword(RoomId),

    /// The player is seated in another room (or already in this one).
    #[error("player {0} is already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    #[error("player {0} is not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    #[error("player {0} is not the admin of room {1}")]
    NotAdmin(PlayerId, RoomId),

    /// The operation isn't valid in the room's current lifecycle state.
    #[error("cannot {op} room {room} while {state}")]
    WrongState {
        room: RoomId,
        state: RoomState,
        op: &'static str,
    },

    /// Manual calls are rejected while automatic calling is on.
    #[error("room {0} is in automatic call mode")]
    WrongMode(RoomId),

    #[error("room {0} has called every number")]
    PoolExhausted(RoomId),

    #[error("number {0} has not been called")]
    NumberNotCalled(u8),

    #[error("pattern {0} is not offered in this game")]
    PatternNotOffered(Pattern),

    #[error("ticket does not satisfy {0}")]
    PatternNotSatisfied(Pattern),

    #[error("{0} has already been won")]
    AlreadyWon(Pattern),

    #[error("cannot withdraw {requested}: balance is {balance}")]
    InsufficientBalance { requested: u64, balance: u64 },

    /// The room's actor is gone or stopped answering.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RoomError {
    /// The stable code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomError::NotFound(_) => ErrorCode::RoomNotFound,
            RoomError::InvalidGameType(_) => ErrorCode::InvalidGameType,
            RoomError::InvalidStake(_) => ErrorCode::InvalidStake,
            RoomError::InvalidNumber(_) => ErrorCode::InvalidNumber,
            RoomError::RoomFull(_) => ErrorCode::RoomFull,
            RoomError::CapacityExceeded(_) => ErrorCode::CapacityExceeded,
            RoomError::NotJoinable(..) => ErrorCode::RoomNotJoinable,
            RoomError::NotPublic(_) => ErrorCode::RoomNotPublic,
            RoomError::WrongPassword(_) => ErrorCode::WrongPassword,
            RoomError::AlreadyInRoom(..) => ErrorCode::AlreadyInRoom,
            RoomError::NotInRoom(..) => ErrorCode::NotInRoom,
            RoomError::NotAdmin(..) => ErrorCode::NotAdmin,
            RoomError::WrongState { .. } => ErrorCode::WrongState,
            RoomError::WrongMode(_) => ErrorCode::WrongMode,
            RoomError::PoolExhausted(_) => ErrorCode::PoolExhausted,
            RoomError::NumberNotCalled(_) => ErrorCode::NumberNotCalled,
            RoomError::PatternNotOffered(_) => ErrorCode::PatternNotOffered,
            RoomError::PatternNotSatisfied(_) => ErrorCode::PatternNotSatisfied,
            RoomError::AlreadyWon(_) => ErrorCode::AlreadyWon,
            RoomError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            RoomError::Unavailable(_) => ErrorCode::RoomUnavailable,
            RoomError::Internal(_) => ErrorCode::Internal,
        }
    }
}
