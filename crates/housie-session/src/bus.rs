//! Room-scoped fan-out of events.
//!
//! Publishing never blocks: each subscriber has its own unbounded outbound
//! queue drained by that connection's writer task, so a slow socket only
//! delays itself. Per-room ordering holds because each room publishes from
//! a single task (its actor) and each queue is FIFO.

use std::sync::Arc;

use housie_protocol::{Event, PlayerId, RoomId};
use housie_transport::ConnectionId;

use crate::registry::{ConnectionRegistry, Delivery};
use crate::SessionError;

/// The connection and request that caused an event.
///
/// Only the copy of an event delivered to `conn` carries `request_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub conn: ConnectionId,
    pub request_id: Option<String>,
}

impl Origin {
    pub fn new(conn: ConnectionId, request_id: Option<String>) -> Self {
        Self { conn, request_id }
    }
}

/// Delivers room events to the connections subscribed to that room.
#[derive(Clone)]
pub struct BroadcastBus {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastBus {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Sends `event` to every current subscriber of `room`.
    ///
    /// The copy for the origin connection carries its request id; everyone
    /// else gets it uncorrelated. Returns how many subscribers it reached.
    pub fn publish(
        &self,
        room: RoomId,
        event: &Event,
        origin: Option<&Origin>,
    ) -> usize {
        self.fan_out(room, None, event, origin)
    }

    /// Like [`publish`](Self::publish), restricted to one player's
    /// connections in `room`.
    pub fn publish_to_player(
        &self,
        room: RoomId,
        player: PlayerId,
        event: &Event,
        origin: Option<&Origin>,
    ) -> usize {
        self.fan_out(room, Some(player), event, origin)
    }

    /// Sends directly to one connection, regardless of room.
    pub fn send_to(
        &self,
        conn: ConnectionId,
        event: Event,
        request_id: Option<String>,
    ) -> Result<(), SessionError> {
        self.registry.send_to(conn, Delivery { request_id, event })
    }

    fn fan_out(
        &self,
        room: RoomId,
        player: Option<PlayerId>,
        event: &Event,
        origin: Option<&Origin>,
    ) -> usize {
        let mut delivered = 0;
        for route in self.registry.routes(room) {
            if player.is_some() && route.player != player {
                continue;
            }
            let request_id = match origin {
                Some(o) if o.conn == route.conn => o.request_id.clone(),
                _ => None,
            };
            let delivery = Delivery {
                request_id,
                event: event.clone(),
            };
            if route.outbox.send(delivery).is_err() {
                // Eviction is the registry's job; keep going for everyone else.
                self.registry.report_failure(route.conn);
            } else {
                delivered += 1;
            }
        }
        tracing::trace!(%room, kind = event.kind(), delivered, "event published");
        delivered
    }
}
