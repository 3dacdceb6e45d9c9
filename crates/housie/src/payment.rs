//! Payment gateway seam.
//!
//! The server never takes money itself. Before a player is seated it asks
//! a [`PaymentGateway`] what it knows about that player's stake, and only
//! a `completed` payment lets the join through.

use async_trait::async_trait;
use housie_protocol::{PlayerId, RoomId};
use housie_room::{Payment, PaymentStatus};

use crate::PaymentError;

/// Read-only view of an external payment provider.
///
/// Object safe, so the server holds it as `Arc<dyn PaymentGateway>`.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// The payment covering `player_id`'s `stake` for `room_id`.
    ///
    /// # Errors
    /// [`PaymentError`] when the provider can't answer or has nothing on
    /// record. Both reject the join.
    async fn payment_status(
        &self,
        player_id: PlayerId,
        room_id: RoomId,
        stake: u64,
    ) -> Result<Payment, PaymentError>;
}

/// Treats every stake as paid. The default gateway.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllPayments;

#[async_trait]
impl PaymentGateway for AcceptAllPayments {
    async fn payment_status(
        &self,
        player_id: PlayerId,
        room_id: RoomId,
        stake: u64,
    ) -> Result<Payment, PaymentError> {
        Ok(Payment::new(player_id, stake, "direct", PaymentStatus::Completed)
            .with_transaction_id(format!("{room_id}-{player_id}")))
    }
}
