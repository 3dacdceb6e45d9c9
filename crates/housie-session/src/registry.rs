//! The connection registry: every live connection, who it belongs to, which
//! room it listens to, and when we last heard from it.
//!
//! # Concurrency
//!
//! Backed by a [`DashMap`], so the accept loop, every connection task, every
//! room actor, and the heartbeat sweeper can all touch it at once. No method
//! holds a shard lock across an `.await`, and no method calls back into the
//! map while iterating it.

use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use housie_protocol::{Event, PlayerId, RoomId};
use housie_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{Identity, SessionError};

/// One queued outbound message. The connection's writer task stamps the
/// sequence number and timestamp when it encodes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub request_id: Option<String>,
    pub event: Event,
}

/// Sender half of a connection's outbound queue.
pub type Outbox = mpsc::UnboundedSender<Delivery>;

/// Heartbeat tuning.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How often clients are expected to send something (usually `PING`).
    pub heartbeat_interval: Duration,
    /// Consecutive silent intervals before a connection is evicted.
    pub max_missed: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            max_missed: 3,
        }
    }
}

/// What was known about a connection when it left the registry.
///
/// The caller uses it to run the "player left" side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub conn: ConnectionId,
    pub identity: Option<Identity>,
    pub room: Option<RoomId>,
}

impl Eviction {
    /// The seated player this connection spoke for, if any.
    pub fn seated_player(&self) -> Option<(PlayerId, RoomId)> {
        match (self.identity, self.room) {
            (Some(identity), Some(room)) => Some((identity.player_id, room)),
            _ => None,
        }
    }
}

/// A routing target handed to the broadcast bus.
pub(crate) struct Route {
    pub(crate) conn: ConnectionId,
    pub(crate) player: Option<PlayerId>,
    pub(crate) outbox: Outbox,
}

struct ConnectionEntry {
    outbox: Outbox,
    identity: Option<Identity>,
    room: Option<RoomId>,
    last_ping: Instant,
    last_pong: Instant,
    alive: bool,
}

/// Tracks every live connection.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    config: RegistryConfig,
    /// Connections whose delivery failed, reported by the bus. Drained by
    /// the next [`sweep`](Self::sweep).
    failed: Mutex<Vec<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            connections: DashMap::new(),
            config,
            failed: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Adds a connection. Registering an id twice keeps the first entry and
    /// returns `false`.
    pub fn register(&self, conn: ConnectionId, outbox: Outbox) -> bool {
        let now = Instant::now();
        let mut inserted = false;
        self.connections.entry(conn).or_insert_with(|| {
            inserted = true;
            ConnectionEntry {
                outbox,
                identity: None,
                room: None,
                last_ping: now,
                last_pong: now,
                alive: true,
            }
        });
        if inserted {
            tracing::debug!(%conn, "connection registered");
        }
        inserted
    }

    /// Removes a connection. Returns what it was bound to, or `None` if it
    /// was already gone.
    pub fn unregister(&self, conn: ConnectionId) -> Option<Eviction> {
        let (_, entry) = self.connections.remove(&conn)?;
        tracing::debug!(%conn, "connection unregistered");
        Some(Eviction {
            conn,
            identity: entry.identity,
            room: entry.room,
        })
    }

    /// Attaches an authenticated identity to a connection.
    pub fn set_identity(&self, conn: ConnectionId, identity: Identity) -> Result<(), SessionError> {
        let mut entry = self
            .connections
            .get_mut(&conn)
            .ok_or(SessionError::NotRegistered(conn))?;
        entry.identity = Some(identity);
        Ok(())
    }

    pub fn identity(&self, conn: ConnectionId) -> Option<Identity> {
        self.connections.get(&conn).and_then(|e| e.identity)
    }

    /// Subscribes a connection to a room's broadcasts. A connection listens
    /// to at most one room; binding again moves it.
    pub fn bind(&self, conn: ConnectionId, room: RoomId) -> Result<(), SessionError> {
        let mut entry = self
            .connections
            .get_mut(&conn)
            .ok_or(SessionError::NotRegistered(conn))?;
        entry.room = Some(room);
        Ok(())
    }

    /// Stops a connection listening to its room.
    pub fn unbind(&self, conn: ConnectionId) {
        if let Some(mut entry) = self.connections.get_mut(&conn) {
            entry.room = None;
        }
    }

    /// Unbinds every connection of `player` from `room`.
    pub fn unbind_player(&self, player: PlayerId, room: RoomId) {
        for mut entry in self.connections.iter_mut() {
            if entry.room == Some(room) && entry.identity.map(|i| i.player_id) == Some(player) {
                entry.room = None;
            }
        }
    }

    /// Unbinds every connection from `room`, e.g. when it is archived.
    pub fn unbind_room(&self, room: RoomId) {
        for mut entry in self.connections.iter_mut() {
            if entry.room == Some(room) {
                entry.room = None;
            }
        }
    }

    pub fn room_of(&self, conn: ConnectionId) -> Option<RoomId> {
        self.connections.get(&conn).and_then(|e| e.room)
    }

    /// Connections currently subscribed to `room`, computed on demand.
    pub fn subscribers_of(&self, room: RoomId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|e| e.alive && e.room == Some(room))
            .map(|e| *e.key())
            .collect()
    }

    /// Returns `true` if `player` has a live connection other than `except`
    /// bound to `room`.
    pub fn has_player_connection(&self, player: PlayerId, room: RoomId, except: ConnectionId) -> bool {
        self.connections.iter().any(|e| {
            *e.key() != except
                && e.alive
                && e.room == Some(room)
                && e.identity.map(|i| i.player_id) == Some(player)
        })
    }

    /// Records that the client was heard from. Returns `false` for an
    /// unknown connection.
    pub fn heartbeat(&self, conn: ConnectionId) -> bool {
        match self.connections.get_mut(&conn) {
            Some(mut entry) => {
                let now = Instant::now();
                entry.last_ping = now;
                entry.last_pong = now;
                true
            }
            None => false,
        }
    }

    /// When the client was last heard from.
    pub fn last_ping(&self, conn: ConnectionId) -> Option<Instant> {
        self.connections.get(&conn).map(|e| e.last_ping)
    }

    /// When the server last answered a heartbeat.
    pub fn last_pong(&self, conn: ConnectionId) -> Option<Instant> {
        self.connections.get(&conn).map(|e| e.last_pong)
    }

    pub fn is_alive(&self, conn: ConnectionId) -> bool {
        self.connections.get(&conn).is_some_and(|e| e.alive)
    }

    /// Marks a connection dead after a failed delivery. It stops receiving
    /// broadcasts immediately and is removed by the next sweep.
    pub fn report_failure(&self, conn: ConnectionId) {
        let Some(mut entry) = self.connections.get_mut(&conn) else {
            return;
        };
        if entry.alive {
            entry.alive = false;
            drop(entry);
            tracing::warn!(%conn, "delivery failed, connection marked dead");
            if let Ok(mut failed) = self.failed.lock() {
                failed.push(conn);
            }
        }
    }

    /// Removes every connection that is marked dead or has missed
    /// `max_missed` consecutive heartbeats as of `now`.
    ///
    /// Evicting a connection that is already gone is a no-op, so racing a
    /// normal disconnect is harmless.
    pub fn sweep(&self, now: Instant) -> Vec<Eviction> {
        let interval = self.config.heartbeat_interval.as_millis().max(1);
        let max_missed = u128::from(self.config.max_missed.max(1));

        let mut doomed: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|e| {
                let missed = now.saturating_duration_since(e.last_ping).as_millis() / interval;
                !e.alive || missed >= max_missed
            })
            .map(|e| *e.key())
            .collect();
        if let Ok(mut failed) = self.failed.lock() {
            doomed.append(&mut failed);
        }
        doomed.sort_unstable();
        doomed.dedup();

        let evicted: Vec<Eviction> = doomed
            .into_iter()
            .filter_map(|conn| self.unregister(conn))
            .collect();
        for ev in &evicted {
            tracing::info!(conn = %ev.conn, room = ?ev.room, "connection evicted");
        }
        evicted
    }

    /// Queues an event for a single connection.
    pub fn send_to(&self, conn: ConnectionId, delivery: Delivery) -> Result<(), SessionError> {
        let outbox = self
            .connections
            .get(&conn)
            .map(|e| e.outbox.clone())
            .ok_or(SessionError::NotRegistered(conn))?;
        outbox.send(delivery).map_err(|_| {
            self.report_failure(conn);
            SessionError::DeliveryFailed(conn)
        })
    }

    /// Snapshot of the routing targets for a room.
    pub(crate) fn routes(&self, room: RoomId) -> Vec<Route> {
        self.connections
            .iter()
            .filter(|e| e.alive && e.room == Some(room))
            .map(|e| Route {
                conn: *e.key(),
                player: e.identity.map(|i| i.player_id),
                outbox: e.outbox.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
