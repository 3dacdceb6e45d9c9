//! Wire protocol for Housie.
//!
//! This crate defines the "language" that clients and the game server speak:
//!
//! - **Requests** ([`Inbound`], [`Request`]) — a closed, tagged set of
//!   client commands, one variant per message type.
//! - **Events** ([`Outbound`], [`Event`]) — everything the server pushes
//!   back, from room snapshots to typed errors.
//! - **Shared types** ([`PlayerId`], [`RoomId`], [`Pattern`], [`CallMode`],
//!   [`RoomState`], snapshots) — the vocabulary both sides agree on.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages become bytes.
//! - **Error codes** ([`ErrorCode`], [`ErrorKind`]) — stable identifiers for
//!   every rejection the server can produce.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Inbound/Outbound) → Session → Room
//! ```
//!
//! The protocol layer doesn't know about connections or rooms as live
//! objects — it only knows how to describe them on the wire.

mod code;
mod codec;
mod error;
mod event;
mod request;
mod types;

pub use code::{ErrorCode, ErrorKind};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{Event, Outbound};
pub use request::{Inbound, Request};
pub use types::{
    CallMode, EndReason, Pattern, PlayerId, PlayerSummary, PlayerView,
    RoomId, RoomListEntry, RoomOptions, RoomSnapshot, RoomState, TicketView,
    WinnerRecord, now_millis,
};
