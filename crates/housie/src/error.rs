//! Unified error type for the Housie server.

use housie_caller::CallerError;
use housie_protocol::{ErrorCode, ProtocolError};
use housie_room::{ConfigError, RoomError, StoreError};
use housie_session::SessionError;
use housie_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// Anything that reaches a client is turned into an `ERROR` event through
/// [`code`](Self::code) and the `Display` text.
#[derive(Debug, thiserror::Error)]
pub enum HousieError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Caller(#[from] CallerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// A request refused by the dispatcher before any room saw it.
    #[error("{message}")]
    Rejected { code: ErrorCode, message: String },
}

impl HousieError {
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        HousieError::Rejected {
            code,
            message: message.into(),
        }
    }

    /// The stable code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            HousieError::Transport(_) => ErrorCode::DeliveryFailed,
            HousieError::Protocol(_) => ErrorCode::InvalidRequest,
            HousieError::Session(e) => e.code(),
            HousieError::Room(e) => e.code(),
            HousieError::Caller(_) | HousieError::Config(_) | HousieError::Store(_) => {
                ErrorCode::Internal
            }
            HousieError::Payment(_) => ErrorCode::PaymentRequired,
            HousieError::Rejected { code, .. } => *code,
        }
    }
}

/// Failures reported by a [`PaymentGateway`](crate::PaymentGateway).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    /// The gateway couldn't be reached or refused to answer.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway has no payment on record for this player.
    #[error("no payment found for {0}")]
    NotFound(String),
}
