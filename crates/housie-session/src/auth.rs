//! Authentication hook for validating connection identity.
//!
//! Housie doesn't issue or verify tokens itself. The server calls an
//! [`Authenticator`] when a client sends `AUTHENTICATE` and trusts the
//! [`Identity`] it returns for the rest of the connection's life.

use housie_protocol::PlayerId;

use crate::SessionError;

/// Who is on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    pub player_id: PlayerId,
    /// Admins may create rooms and run games.
    pub is_admin: bool,
}

impl Identity {
    pub fn player(player_id: PlayerId) -> Self {
        Self {
            player_id,
            is_admin: false,
        }
    }

    pub fn admin(player_id: PlayerId) -> Self {
        Self {
            player_id,
            is_admin: true,
        }
    }
}

/// Validates a client's token and returns their identity.
///
/// # Example
///
/// ```rust
/// use housie_protocol::PlayerId;
/// use housie_session::{Authenticator, Identity, SessionError};
///
/// /// Accepts `"player:<id>"`. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
///         let id = token
///             .strip_prefix("player:")
///             .and_then(|raw| raw.parse().ok())
///             .ok_or_else(|| SessionError::AuthFailed("bad token".into()))?;
///         Ok(Identity::player(PlayerId(id)))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] if the token is invalid or expired.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}
