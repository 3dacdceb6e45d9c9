//! Error types for the session layer.

use housie_protocol::ErrorCode;
use housie_transport::ConnectionId;

/// Errors raised while authenticating or tracking connections.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was missing, malformed, or rejected by the
    /// [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The connection isn't in the registry (never registered, or already
    /// evicted).
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),

    /// The connection's outbound queue is gone; its writer has stopped.
    #[error("delivery to {0} failed")]
    DeliveryFailed(ConnectionId),
}

impl SessionError {
    /// The stable code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::AuthFailed(_) => ErrorCode::Unauthenticated,
            SessionError::NotRegistered(_) | SessionError::DeliveryFailed(_) => {
                ErrorCode::DeliveryFailed
            }
        }
    }
}
