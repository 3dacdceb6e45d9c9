//! Persistence seam for players, rooms, and payments.
//!
//! Rooms hand records to a [`Persistence`] after they mutate; they never
//! wait on it inside their serialized section. [`MemoryStore`] keeps
//! everything in process and is the default backend.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use housie_protocol::{now_millis, PlayerId, PlayerView, RoomId, RoomSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// A stake payment made by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub player_id: PlayerId,
    pub amount: u64,
    pub method: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub timestamp: u64,
}

impl Payment {
    pub fn new(player_id: PlayerId, amount: u64, method: impl Into<String>, status: PaymentStatus) -> Self {
        Self {
            player_id,
            amount,
            method: method.into(),
            status,
            transaction_id: None,
            timestamp: now_millis(),
        }
    }

    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Where rooms write their records.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save_player(&self, player: PlayerView) -> Result<(), StoreError>;

    async fn get_player(&self, id: PlayerId) -> Result<Option<PlayerView>, StoreError>;

    async fn save_room(&self, room: RoomSnapshot) -> Result<(), StoreError>;

    async fn get_room(&self, id: RoomId) -> Result<Option<RoomSnapshot>, StoreError>;

    async fn save_payment(&self, payment: Payment) -> Result<(), StoreError>;

    /// A player's payments, oldest first.
    async fn get_player_payments(&self, id: PlayerId) -> Result<Vec<Payment>, StoreError>;
}

/// In-process [`Persistence`]. Latest write wins for players and rooms;
/// payments append.
#[derive(Debug, Default)]
pub struct MemoryStore {
    players: DashMap<PlayerId, PlayerView>,
    rooms: DashMap<RoomId, RoomSnapshot>,
    payments: DashMap<PlayerId, Vec<Payment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn save_player(&self, player: PlayerView) -> Result<(), StoreError> {
        self.players.insert(player.player_id, player);
        Ok(())
    }

    async fn get_player(&self, id: PlayerId) -> Result<Option<PlayerView>, StoreError> {
        Ok(self.players.get(&id).map(|p| p.clone()))
    }

    async fn save_room(&self, room: RoomSnapshot) -> Result<(), StoreError> {
        self.rooms.insert(room.room_id, room);
        Ok(())
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<RoomSnapshot>, StoreError> {
        Ok(self.rooms.get(&id).map(|r| r.clone()))
    }

    async fn save_payment(&self, payment: Payment) -> Result<(), StoreError> {
        self.payments.entry(payment.player_id).or_default().push(payment);
        Ok(())
    }

    async fn get_player_payments(&self, id: PlayerId) -> Result<Vec<Payment>, StoreError> {
        Ok(self.payments.get(&id).map(|p| p.clone()).unwrap_or_default())
    }
}
