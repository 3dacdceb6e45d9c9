//! Request dispatch.
//!
//! The [`GameStateMachine`] sits between a connection's reader loop and
//! the [`RoomManager`]. It checks who is asking and whether the request is
//! well-formed, then hands the request to the room. Everything a room
//! publishes goes out through the bus from inside the room actor; the
//! machine itself only answers directly (`AUTHENTICATED`, `PONG`,
//! `ROOM_LIST`, `ERROR`).

use std::sync::Arc;

use housie_protocol::{now_millis, CallMode, ErrorCode, Event, Inbound, PlayerId, Request};
use housie_room::{JoinRequest, RoomManager};
use housie_session::{Authenticator, BroadcastBus, ConnectionRegistry, Eviction, Identity, Origin};
use housie_transport::ConnectionId;
use tracing::{debug, info};

use crate::payment::{AcceptAllPayments, PaymentGateway};
use crate::HousieError;

/// Authorizes, validates, and routes every inbound request.
pub struct GameStateMachine<A: Authenticator> {
    rooms: Arc<RoomManager>,
    auth: A,
    payments: Arc<dyn PaymentGateway>,
}

impl<A: Authenticator> GameStateMachine<A> {
    /// A machine that accepts every payment. See
    /// [`with_payments`](Self::with_payments).
    pub fn new(rooms: Arc<RoomManager>, auth: A) -> Self {
        Self {
            rooms,
            auth,
            payments: Arc::new(AcceptAllPayments),
        }
    }

    pub fn with_payments(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.payments = gateway;
        self
    }

    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.rooms
    }

    pub fn bus(&self) -> &BroadcastBus {
        self.rooms.bus()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.rooms.bus().registry()
    }

    /// Handles one decoded request from `conn`.
    ///
    /// Never fails: a rejected request becomes an `ERROR` event for `conn`
    /// carrying the request's id.
    pub async fn handle(&self, conn: ConnectionId, inbound: Inbound) {
        let Inbound {
            request_id,
            timestamp,
            request,
        } = inbound;
        let kind = request.kind();
        let origin = Origin::new(conn, request_id);

        if let Err(e) = self.dispatch(&origin, timestamp, request).await {
            debug!(%conn, request = kind, code = %e.code(), error = %e, "request rejected");
            self.reject(conn, origin.request_id, e.code(), e.to_string());
        }
    }

    /// Sends an `ERROR` event to one connection.
    pub fn reject(
        &self,
        conn: ConnectionId,
        request_id: Option<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) {
        if let Err(e) = self.bus().send_to(conn, Event::error(code, message), request_id) {
            debug!(%conn, error = %e, "could not deliver error");
        }
    }

    async fn dispatch(
        &self,
        origin: &Origin,
        client_time: u64,
        request: Request,
    ) -> Result<(), HousieError> {
        let conn = origin.conn;
        match request {
            Request::Ping => {
                let pong = Event::Pong {
                    client_time,
                    server_time: now_millis(),
                };
                return Ok(self.bus().send_to(conn, pong, origin.request_id.clone())?);
            }
            Request::Authenticate { token } => return self.authenticate(origin, &token).await,
            _ => {}
        }

        let identity = self.registry().identity(conn).ok_or_else(|| {
            HousieError::rejected(ErrorCode::Unauthenticated, "authenticate before anything else")
        })?;

        match request {
            Request::CreateRoom {
                game_type,
                stake,
                admin_id,
                options,
            } => {
                require_admin(&identity, admin_id)?;
                if game_type.trim().is_empty() {
                    return Err(HousieError::rejected(ErrorCode::InvalidRequest, "gameType is required"));
                }
                valid_call_mode(&options.call_mode)?;
                self.rooms
                    .create_room(game_type.trim(), stake, admin_id, options, Some(origin))?;
            }

            Request::JoinRoom {
                room_id,
                player_id,
                name,
                phone,
                stake,
                password,
            } => {
                require_self(&identity, player_id)?;
                let name = required("name", &name)?;
                let phone = required("phone", &phone)?;

                // Asked before the room is, so a slow gateway never stalls it.
                let payment = self.payments.payment_status(player_id, room_id, stake).await?;
                if !payment.is_completed() {
                    return Err(HousieError::rejected(
                        ErrorCode::PaymentRequired,
                        format!("payment for {player_id} is {:?}", payment.status),
                    ));
                }

                let req = JoinRequest {
                    player_id,
                    name,
                    phone,
                    stake,
                    password,
                    payment: Some(payment),
                };
                let outcome = self.rooms.join_room(room_id, req, Some(origin.clone())).await?;
                if outcome.rejoined {
                    info!(%player_id, %room_id, "player reconnected to room");
                }
            }

            Request::LeaveRoom { room_id, player_id } => {
                require_self(&identity, player_id)?;
                self.rooms
                    .leave_room(room_id, player_id, Some(origin.clone()))
                    .await?;
            }

            Request::StartGame { room_id, admin_id } => {
                require_admin(&identity, admin_id)?;
                self.rooms
                    .start_game(room_id, admin_id, Some(origin.clone()))
                    .await?;
            }

            Request::CallNumber { room_id, admin_id } => {
                require_admin(&identity, admin_id)?;
                self.rooms
                    .call_number(room_id, admin_id, Some(origin.clone()))
                    .await?;
            }

            Request::MarkNumber {
                room_id,
                player_id,
                number,
            } => {
                require_self(&identity, player_id)?;
                self.rooms
                    .mark_number(room_id, player_id, number, Some(origin.clone()))
                    .await?;
            }

            Request::ClaimPattern {
                room_id,
                player_id,
                pattern,
            } => {
                require_self(&identity, player_id)?;
                self.rooms
                    .claim(room_id, player_id, pattern, Some(origin.clone()))
                    .await?;
            }

            Request::SetCallMode {
                room_id,
                admin_id,
                mode,
            } => {
                require_admin(&identity, admin_id)?;
                valid_call_mode(&mode)?;
                self.rooms
                    .set_call_mode(room_id, admin_id, mode, Some(origin.clone()))
                    .await?;
            }

            Request::EndGame { room_id, admin_id } => {
                require_admin(&identity, admin_id)?;
                self.rooms
                    .end_game(room_id, admin_id, Some(origin.clone()))
                    .await?;
            }

            Request::Withdraw {
                room_id,
                player_id,
                amount,
            } => {
                require_self(&identity, player_id)?;
                if amount == 0 {
                    return Err(HousieError::rejected(ErrorCode::InvalidRequest, "amount must be positive"));
                }
                self.rooms
                    .withdraw(room_id, player_id, amount, Some(origin.clone()))
                    .await?;
            }

            Request::ListRooms => {
                let rooms = self.rooms.list_rooms().await;
                self.bus()
                    .send_to(conn, Event::RoomList { rooms }, origin.request_id.clone())?;
            }

            Request::Ping | Request::Authenticate { .. } => {}
        }
        Ok(())
    }

    async fn authenticate(&self, origin: &Origin, token: &str) -> Result<(), HousieError> {
        let conn = origin.conn;
        let identity = self.auth.authenticate(token).await?;

        if let Some(current) = self.registry().identity(conn) {
            if current != identity {
                return Err(HousieError::rejected(
                    ErrorCode::IdentityMismatch,
                    format!("connection is already authenticated as {}", current.player_id),
                ));
            }
        }
        self.registry().set_identity(conn, identity)?;
        info!(%conn, player_id = %identity.player_id, is_admin = identity.is_admin, "authenticated");

        let reply = Event::Authenticated {
            player_id: identity.player_id,
            is_admin: identity.is_admin,
            server_time: now_millis(),
        };
        Ok(self.bus().send_to(conn, reply, origin.request_id.clone())?)
    }

    /// Runs the "player left" side effect for a connection that closed.
    pub async fn disconnect(&self, conn: ConnectionId) {
        if let Some(eviction) = self.registry().unregister(conn) {
            self.evicted(eviction).await;
        }
    }

    /// Takes a departed connection's player out of its room, unless the
    /// same player is still connected to that room some other way.
    pub async fn evicted(&self, eviction: Eviction) {
        let Some((player_id, room_id)) = eviction.seated_player() else {
            return;
        };
        if self
            .registry()
            .has_player_connection(player_id, room_id, eviction.conn)
        {
            debug!(%player_id, %room_id, "player still connected elsewhere, keeping seat");
            return;
        }
        match self.rooms.leave_room(room_id, player_id, None).await {
            Ok(_) => info!(%player_id, %room_id, conn = %eviction.conn, "player removed after disconnect"),
            Err(e) => debug!(%player_id, %room_id, error = %e, "no leave after disconnect"),
        }
    }
}

/// The request must speak for the connection's own player.
fn require_self(identity: &Identity, claimed: PlayerId) -> Result<(), HousieError> {
    if identity.player_id != claimed {
        return Err(HousieError::rejected(
            ErrorCode::IdentityMismatch,
            format!("connection is {}, request names {claimed}", identity.player_id),
        ));
    }
    Ok(())
}

fn require_admin(identity: &Identity, admin_id: PlayerId) -> Result<(), HousieError> {
    require_self(identity, admin_id)?;
    if !identity.is_admin {
        return Err(HousieError::rejected(
            ErrorCode::NotAdmin,
            format!("{admin_id} is not an admin"),
        ));
    }
    Ok(())
}

fn valid_call_mode(mode: &CallMode) -> Result<(), HousieError> {
    if let CallMode::Automatic { interval_ms: 0 } = mode {
        return Err(HousieError::rejected(
            ErrorCode::InvalidRequest,
            "intervalMs must be positive",
        ));
    }
    Ok(())
}

fn required(field: &str, value: &str) -> Result<String, HousieError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(HousieError::rejected(
            ErrorCode::InvalidRequest,
            format!("{field} is required"),
        ));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_self_rejects_other_players() {
        let me = Identity::player(PlayerId(1));
        assert!(require_self(&me, PlayerId(1)).is_ok());
        let err = require_self(&me, PlayerId(2)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IdentityMismatch);
    }

    #[test]
    fn test_require_admin_checks_flag_after_identity() {
        let player = Identity::player(PlayerId(1));
        assert_eq!(
            require_admin(&player, PlayerId(1)).unwrap_err().code(),
            ErrorCode::NotAdmin
        );
        assert_eq!(
            require_admin(&player, PlayerId(9)).unwrap_err().code(),
            ErrorCode::IdentityMismatch
        );
        assert!(require_admin(&Identity::admin(PlayerId(1)), PlayerId(1)).is_ok());
    }

    #[test]
    fn test_zero_interval_is_not_a_call_mode() {
        assert!(valid_call_mode(&CallMode::Manual).is_ok());
        assert!(valid_call_mode(&CallMode::Automatic { interval_ms: 250 }).is_ok());
        assert_eq!(
            valid_call_mode(&CallMode::Automatic { interval_ms: 0 }).unwrap_err().code(),
            ErrorCode::InvalidRequest
        );
    }

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("name", "  Asha ").unwrap(), "Asha");
        assert_eq!(
            required("phone", "   ").unwrap_err().code(),
            ErrorCode::InvalidRequest
        );
    }
}
