//! Stable error codes carried by `ERROR` events.
//!
//! Clients switch on these, so the serialized names never change once
//! shipped. Every code belongs to exactly one [`ErrorKind`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// The broad category of a rejection.
///
/// - **Validation**: malformed or out-of-range request fields. Nothing was
///   mutated.
/// - **State**: the request is well-formed but invalid for the room's
///   current lifecycle state.
/// - **Conflict**: someone else got there first (pattern already won, room
///   full, player already seated elsewhere).
/// - **Authorization**: the caller isn't allowed to do this.
/// - **Connection**: delivery to a specific subscriber failed.
/// - **Internal**: an unexpected fault. The room that hit it is ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    Validation,
    State,
    Conflict,
    Authorization,
    Connection,
    Internal,
}

/// A stable, machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Validation --
    InvalidRequest,
    InvalidGameType,
    InvalidStake,
    InvalidNumber,
    PatternNotOffered,
    InsufficientBalance,

    // -- State --
    RoomNotFound,
    RoomNotJoinable,
    NotInRoom,
    WrongState,
    WrongMode,
    PoolExhausted,
    NumberNotCalled,
    PatternNotSatisfied,

    // -- Conflict --
    RoomFull,
    CapacityExceeded,
    AlreadyInRoom,
    AlreadyWon,

    // -- Authorization --
    Unauthenticated,
    NotAdmin,
    IdentityMismatch,
    RoomNotPublic,
    WrongPassword,
    PaymentRequired,

    // -- Connection --
    DeliveryFailed,

    // -- Internal --
    RoomUnavailable,
    Internal,
}

impl ErrorCode {
    /// The category this code belongs to.
    pub fn kind(self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            InvalidRequest | InvalidGameType | InvalidStake | InvalidNumber
            | PatternNotOffered | InsufficientBalance => ErrorKind::Validation,
            RoomNotFound | RoomNotJoinable | NotInRoom | WrongState | WrongMode
            | PoolExhausted | NumberNotCalled | PatternNotSatisfied => ErrorKind::State,
            RoomFull | CapacityExceeded | AlreadyInRoom | AlreadyWon => ErrorKind::Conflict,
            Unauthenticated | NotAdmin | IdentityMismatch | RoomNotPublic | WrongPassword
            | PaymentRequired => ErrorKind::Authorization,
            DeliveryFailed => ErrorKind::Connection,
            RoomUnavailable | Internal => ErrorKind::Internal,
        }
    }

    /// Returns `true` if the client may fix its request and try again.
    ///
    /// Internal errors are the only ones that aren't the caller's problem.
    pub fn is_recoverable(self) -> bool {
        self.kind() != ErrorKind::Internal
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorCode {
    /// The wire spelling, so logs and client payloads agree.
    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            InvalidRequest => "INVALID_REQUEST",
            InvalidGameType => "INVALID_GAME_TYPE",
            InvalidStake => "INVALID_STAKE",
            InvalidNumber => "INVALID_NUMBER",
            PatternNotOffered => "PATTERN_NOT_OFFERED",
            InsufficientBalance => "INSUFFICIENT_BALANCE",
            RoomNotFound => "ROOM_NOT_FOUND",
            RoomNotJoinable => "ROOM_NOT_JOINABLE",
            NotInRoom => "NOT_IN_ROOM",
            WrongState => "WRONG_STATE",
            WrongMode => "WRONG_MODE",
            PoolExhausted => "POOL_EXHAUSTED",
            NumberNotCalled => "NUMBER_NOT_CALLED",
            PatternNotSatisfied => "PATTERN_NOT_SATISFIED",
            RoomFull => "ROOM_FULL",
            CapacityExceeded => "CAPACITY_EXCEEDED",
            AlreadyInRoom => "ALREADY_IN_ROOM",
            AlreadyWon => "ALREADY_WON",
            Unauthenticated => "UNAUTHENTICATED",
            NotAdmin => "NOT_ADMIN",
            IdentityMismatch => "IDENTITY_MISMATCH",
            RoomNotPublic => "ROOM_NOT_PUBLIC",
            WrongPassword => "WRONG_PASSWORD",
            PaymentRequired => "PAYMENT_REQUIRED",
            DeliveryFailed => "DELIVERY_FAILED",
            RoomUnavailable => "ROOM_UNAVAILABLE",
            Internal => "INTERNAL",
        }
    }
}
