//! Room manager: creates rooms, routes requests to them, and tracks which
//! room each player sits in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use housie_caller::Draw;
use housie_protocol::{
    CallMode, Pattern, PlayerId, PlayerView, RoomId, RoomListEntry, RoomOptions, RoomSnapshot,
    WinnerRecord,
};
use housie_session::{BroadcastBus, Origin};
use tracing::{debug, info, warn};

use crate::room::spawn_room;
use crate::state::{JoinOutcome, JoinRequest, RoomGame, RoomInfo};
use crate::store::Persistence;
use crate::{GameConfig, RoomError, RoomHandle};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Owns every live room.
///
/// Shared behind an `Arc` by every connection task and the background
/// sweepers. Both maps are sharded, and no map guard is held across an
/// `.await`.
pub struct RoomManager {
    rooms: DashMap<RoomId, RoomHandle>,
    /// Each player sits in at most one room.
    player_rooms: DashMap<PlayerId, RoomId>,
    next_id: AtomicU64,
    config: Arc<GameConfig>,
    bus: BroadcastBus,
    store: Arc<dyn Persistence>,
    seed: Option<u64>,
    channel_size: usize,
}

impl RoomManager {
    pub fn new(config: Arc<GameConfig>, bus: BroadcastBus, store: Arc<dyn Persistence>) -> Self {
        Self {
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            next_id: AtomicU64::new(1),
            config,
            bus,
            store,
            seed: None,
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Seeds every room's draw order and tickets. Room `n` uses
    /// `seed + n`, so rooms still differ from each other.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_channel_size(mut self, size: usize) -> Self {
        self.channel_size = size.max(1);
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    fn handle(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(&room_id)
            .map(|h| h.clone())
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Creates a room in `Waiting` and subscribes the admin's connection.
    pub fn create_room(
        &self,
        game_type: &str,
        stake: u64,
        admin_id: PlayerId,
        options: RoomOptions,
        origin: Option<&Origin>,
    ) -> Result<RoomSnapshot, RoomError> {
        let room_id = RoomId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let seed = self.seed.map(|s| s.wrapping_add(room_id.0));
        let game = RoomGame::new(room_id, game_type, stake, admin_id, options, &self.config, seed)?;

        if let Some(o) = origin {
            if let Err(e) = self.bus.registry().bind(o.conn, room_id) {
                warn!(%room_id, error = %e, "could not subscribe admin connection");
            }
        }
        let (handle, snapshot) = spawn_room(
            game,
            self.bus.clone(),
            Arc::clone(&self.store),
            self.channel_size,
            origin,
        )?;
        self.rooms.insert(room_id, handle);
        info!(%room_id, %admin_id, game_type, stake, "room created");
        Ok(snapshot)
    }

    /// Seats a player.
    ///
    /// The player's one-room slot is reserved before the room is asked, so
    /// two concurrent joins by the same player can't both succeed. A slot
    /// pointing at a room that has finished (or vanished) is reclaimed.
    pub async fn join_room(
        &self,
        room_id: RoomId,
        req: JoinRequest,
        origin: Option<Origin>,
    ) -> Result<JoinOutcome, RoomError> {
        let handle = self.handle(room_id)?;
        let player_id = req.player_id;
        let reserved = self.reserve(player_id, room_id).await?;

        match handle.join(req, origin).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if reserved {
                    self.player_rooms.remove_if(&player_id, |_, r| *r == room_id);
                }
                Err(e)
            }
        }
    }

    /// Claims `player_id`'s slot for `room_id`. Returns `true` if this call
    /// made the reservation, `false` if it already pointed at `room_id`.
    async fn reserve(&self, player_id: PlayerId, room_id: RoomId) -> Result<bool, RoomError> {
        loop {
            let current = match self.player_rooms.entry(player_id) {
                Entry::Vacant(slot) => {
                    slot.insert(room_id);
                    return Ok(true);
                }
                Entry::Occupied(slot) => *slot.get(),
            };
            if current == room_id {
                return Ok(false);
            }
            if self.is_live(current).await {
                return Err(RoomError::AlreadyInRoom(player_id, current));
            }
            debug!(%player_id, stale = %current, "reclaiming stale room slot");
            self.player_rooms.remove_if(&player_id, |_, r| *r == current);
        }
    }

    async fn is_live(&self, room_id: RoomId) -> bool {
        match self.handle(room_id) {
            Ok(handle) => handle
                .info()
                .await
                .is_ok_and(|info| !info.state.is_finished()),
            Err(_) => false,
        }
    }

    /// Gives up a seat (or, for the admin, walks away from the room).
    pub async fn leave_room(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        origin: Option<Origin>,
    ) -> Result<RoomSnapshot, RoomError> {
        let snapshot = self.handle(room_id)?.leave(player_id, origin).await?;
        self.player_rooms.remove_if(&player_id, |_, r| *r == room_id);
        Ok(snapshot)
    }

    pub async fn start_game(
        &self,
        room_id: RoomId,
        admin_id: PlayerId,
        origin: Option<Origin>,
    ) -> Result<RoomSnapshot, RoomError> {
        self.handle(room_id)?.start(admin_id, origin).await
    }

    pub async fn call_number(
        &self,
        room_id: RoomId,
        admin_id: PlayerId,
        origin: Option<Origin>,
    ) -> Result<Draw, RoomError> {
        self.handle(room_id)?.call_number(admin_id, origin).await
    }

    pub async fn mark_number(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        number: u8,
        origin: Option<Origin>,
    ) -> Result<PlayerView, RoomError> {
        self.handle(room_id)?.mark(player_id, number, origin).await
    }

    pub async fn claim(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        pattern: Pattern,
        origin: Option<Origin>,
    ) -> Result<WinnerRecord, RoomError> {
        self.handle(room_id)?.claim(player_id, pattern, origin).await
    }

    pub async fn set_call_mode(
        &self,
        room_id: RoomId,
        admin_id: PlayerId,
        mode: CallMode,
        origin: Option<Origin>,
    ) -> Result<RoomSnapshot, RoomError> {
        self.handle(room_id)?.set_call_mode(admin_id, mode, origin).await
    }

    pub async fn end_game(
        &self,
        room_id: RoomId,
        admin_id: PlayerId,
        origin: Option<Origin>,
    ) -> Result<RoomSnapshot, RoomError> {
        self.handle(room_id)?.end(admin_id, origin).await
    }

    pub async fn withdraw(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        amount: u64,
        origin: Option<Origin>,
    ) -> Result<PlayerView, RoomError> {
        self.handle(room_id)?.withdraw(player_id, amount, origin).await
    }

    pub async fn snapshot(&self, room_id: RoomId) -> Result<RoomSnapshot, RoomError> {
        self.handle(room_id)?.snapshot().await
    }

    pub async fn room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        self.handle(room_id)?.info().await
    }

    /// Public rooms that are accepting players, ordered by id.
    ///
    /// Rooms that fail to answer (e.g. archiving) are skipped.
    pub async fn list_rooms(&self) -> Vec<RoomListEntry> {
        let mut entries = Vec::new();
        for handle in self.handles() {
            if let Ok(info) = handle.info().await {
                if info.is_listed() {
                    entries.push(RoomListEntry {
                        room_id: info.room_id,
                        game_type: info.game_type,
                        stake: info.stake,
                        state: info.state,
                        player_count: info.player_count,
                        max_players: info.max_players,
                    });
                }
            }
        }
        entries.sort_by_key(|e| e.room_id);
        entries
    }

    /// Archives a room: final records go to persistence, subscribers are
    /// dropped, and the room leaves the registry.
    pub async fn archive(&self, room_id: RoomId) -> Result<RoomSnapshot, RoomError> {
        let snapshot = self.handle(room_id)?.archive().await?;
        self.forget(room_id);
        info!(%room_id, state = %snapshot.state, "room archived");
        Ok(snapshot)
    }

    /// Archives every room that has been `Ended` for at least `retention`,
    /// and discards torn-down rooms. Returns the rooms removed.
    pub async fn archive_expired(&self, retention: Duration) -> Vec<RoomId> {
        let mut removed = Vec::new();
        for handle in self.handles() {
            let room_id = handle.room_id();
            let info = match handle.info().await {
                Ok(info) => info,
                Err(_) => {
                    warn!(%room_id, "room actor gone, dropping room");
                    self.forget(room_id);
                    removed.push(room_id);
                    continue;
                }
            };
            let expired = info
                .ended_at
                .is_some_and(|at| at.elapsed() >= retention);
            if !(expired || info.teardown) {
                continue;
            }
            match self.archive(room_id).await {
                Ok(_) => removed.push(room_id),
                Err(e) => warn!(%room_id, error = %e, "failed to archive room"),
            }
        }
        removed
    }

    fn forget(&self, room_id: RoomId) {
        self.rooms.remove(&room_id);
        self.player_rooms.retain(|_, r| *r != room_id);
        self.bus.registry().unbind_room(room_id);
    }

    fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    /// The room a player currently sits in, if any.
    pub fn player_room(&self, player_id: PlayerId) -> Option<RoomId> {
        self.player_rooms.get(&player_id).map(|r| *r)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }
}
