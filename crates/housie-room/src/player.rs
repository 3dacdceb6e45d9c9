//! A seated player and their money.

use housie_protocol::{now_millis, PlayerId, PlayerSummary, PlayerView, RoomId};

use crate::ticket::Ticket;
use crate::RoomError;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub phone: String,
    pub room_id: Option<RoomId>,
    pub stake: u64,
    pub ticket: Option<Ticket>,
    pub joined_at: u64,
    pub last_active: u64,
    payment: u64,
    won_amount: u64,
    withdrawn: u64,
    balance: u64,
}

impl Player {
    pub fn new(id: PlayerId, name: String, phone: String, room_id: RoomId, stake: u64) -> Self {
        let now = now_millis();
        Self {
            id,
            name,
            phone,
            room_id: Some(room_id),
            stake,
            ticket: None,
            joined_at: now,
            last_active: now,
            payment: 0,
            won_amount: 0,
            withdrawn: 0,
            balance: 0,
        }
    }

    pub fn payment(&self) -> u64 {
        self.payment
    }

    pub fn won_amount(&self) -> u64 {
        self.won_amount
    }

    pub fn withdrawn(&self) -> u64 {
        self.withdrawn
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn record_payment(&mut self, amount: u64) {
        self.payment = self.payment.saturating_add(amount);
        self.recompute();
    }

    pub fn credit_win(&mut self, amount: u64) {
        self.won_amount = self.won_amount.saturating_add(amount);
        self.recompute();
    }

    /// Takes `amount` out of the balance.
    ///
    /// # Errors
    /// [`RoomError::InsufficientBalance`] if `amount` exceeds the balance;
    /// nothing changes in that case.
    pub fn withdraw(&mut self, amount: u64) -> Result<(), RoomError> {
        if amount > self.balance {
            return Err(RoomError::InsufficientBalance {
                requested: amount,
                balance: self.balance,
            });
        }
        self.withdrawn += amount;
        self.recompute();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_active = now_millis();
    }

    fn recompute(&mut self) {
        self.balance = (self.payment + self.won_amount).saturating_sub(self.withdrawn);
    }

    pub fn marked(&self) -> usize {
        self.ticket.as_ref().map_or(0, Ticket::marked_count)
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            player_id: self.id,
            name: self.name.clone(),
            phone: self.phone.clone(),
            room_id: self.room_id,
            stake: self.stake,
            payment: self.payment,
            won_amount: self.won_amount,
            withdrawn: self.withdrawn,
            balance: self.balance,
            ticket: self.ticket.as_ref().map(Ticket::view),
            last_active: self.last_active,
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            player_id: self.id,
            name: self.name.clone(),
            marked: self.marked(),
            won_amount: self.won_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(PlayerId(1), "Asha".into(), "555-0101".into(), RoomId(1), 10)
    }

    #[test]
    fn test_balance_follows_payments_wins_and_withdrawals() {
        let mut p = player();
        p.record_payment(10);
        assert_eq!(p.balance(), 10);
        p.credit_win(25);
        assert_eq!(p.balance(), 35);
        p.withdraw(30).unwrap();
        assert_eq!(p.balance(), 5);
        assert_eq!(p.withdrawn(), 30);
        assert_eq!(p.balance(), p.payment() + p.won_amount() - p.withdrawn());
    }

    #[test]
    fn test_overdraw_is_rejected_without_change() {
        let mut p = player();
        p.record_payment(10);
        let err = p.withdraw(11).unwrap_err();
        assert_eq!(
            err,
            RoomError::InsufficientBalance {
                requested: 11,
                balance: 10
            }
        );
        assert_eq!(p.balance(), 10);
        assert_eq!(p.withdrawn(), 0);
    }

    #[test]
    fn test_view_without_ticket() {
        let view = player().view();
        assert_eq!(view.player_id, PlayerId(1));
        assert_eq!(view.room_id, Some(RoomId(1)));
        assert!(view.ticket.is_none());
        assert_eq!(player().summary().marked, 0);
    }
}
