//! The rules of one room, applied synchronously.
//!
//! [`RoomGame`] owns everything about a room's game: seats, tickets, the
//! number caller, the draw timer, and the winners list. Its methods validate
//! first and mutate second, so an `Err` leaves the room untouched. Anything
//! that has to leave the room (events, subscription changes, records for
//! persistence) is queued as an [`Effect`] for the actor to carry out.

use std::collections::{BTreeMap, HashSet};

use housie_caller::{Draw, DrawConfig, DrawScheduler, NumberCaller};
use housie_protocol::{
    now_millis, CallMode, EndReason, Event, Pattern, PlayerId, PlayerView, RoomId, RoomOptions,
    RoomSnapshot, RoomState, WinnerRecord,
};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::player::Player;
use crate::store::Payment;
use crate::ticket::{MarkOutcome, Ticket, TicketEngine};
use crate::{GameConfig, RoomError};

/// Who receives a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every subscriber of the room.
    Room,
    /// Only this player's connections in the room.
    Player(PlayerId),
    /// Only the connection that sent the current command.
    Origin,
}

/// Something the actor must do after a command succeeds.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Publish(Audience, Event),
    /// Subscribe the requesting connection to this room.
    BindOrigin,
    Unbind(PlayerId),
    UnbindAll,
    SavePlayer(PlayerView),
    SaveRoom(RoomSnapshot),
    SavePayment(Payment),
}

/// A seat request as it reaches the room.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub player_id: PlayerId,
    pub name: String,
    pub phone: String,
    pub stake: u64,
    pub password: Option<String>,
    /// The payment that paid for the seat, if one was taken.
    pub payment: Option<Payment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub snapshot: RoomSnapshot,
    pub player: PlayerView,
    /// `true` if the player already had a seat and only reconnected.
    pub rejoined: bool,
}

/// Room metadata, cheap to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub game_type: String,
    pub stake: u64,
    pub state: RoomState,
    pub public: bool,
    pub player_count: usize,
    pub max_players: usize,
    /// The admin left before the game started; the room will be discarded.
    pub teardown: bool,
    pub admin_present: bool,
    /// When the room entered `Ended`.
    pub ended_at: Option<Instant>,
}

impl RoomInfo {
    /// Open to new players from the lobby.
    pub fn is_listed(&self) -> bool {
        self.public && self.state.is_joinable() && self.admin_present && !self.teardown
    }
}

#[derive(Debug)]
pub struct RoomGame {
    id: RoomId,
    game_type: String,
    stake: u64,
    state: RoomState,
    admin_id: PlayerId,
    admin_departed: bool,
    teardown: bool,
    options: RoomOptions,
    max_players: usize,
    patterns: Vec<Pattern>,
    multipliers: BTreeMap<Pattern, f64>,
    players: BTreeMap<PlayerId, Player>,
    caller: NumberCaller,
    engine: TicketEngine,
    pub(crate) scheduler: DrawScheduler,
    winners: Vec<WinnerRecord>,
    won: HashSet<Pattern>,
    created_at: u64,
    started_at: Option<u64>,
    ended_at: Option<u64>,
    ended_instant: Option<Instant>,
    end_reason: Option<EndReason>,
    effects: Vec<Effect>,
}

impl RoomGame {
    /// Builds a room in `Created`.
    ///
    /// # Errors
    /// `InvalidGameType` or `InvalidStake` if `config` doesn't allow them.
    pub fn new(
        id: RoomId,
        game_type: &str,
        stake: u64,
        admin_id: PlayerId,
        options: RoomOptions,
        config: &GameConfig,
        seed: Option<u64>,
    ) -> Result<Self, RoomError> {
        let game = config
            .game_type(game_type)
            .ok_or_else(|| RoomError::InvalidGameType(game_type.to_string()))?;
        if !config.is_valid_stake(stake) {
            return Err(RoomError::InvalidStake(stake));
        }
        let max_players = options
            .max_players
            .unwrap_or(config.max_players)
            .clamp(1, config.max_players);
        let caller = NumberCaller::new(config.pool_size, seed)
            .map_err(|e| RoomError::Internal(e.to_string()))?;
        let engine = TicketEngine::new(max_players, seed.map(|s| s.rotate_left(32)));

        let interval = match options.call_mode {
            CallMode::Automatic { interval_ms } => Duration::from_millis(interval_ms),
            CallMode::Manual => config.default_call_interval(),
        };
        let scheduler = DrawScheduler::new(DrawConfig {
            interval,
            initial_jitter: config.draw_jitter(),
        });

        Ok(Self {
            id,
            game_type: game_type.to_string(),
            stake,
            state: RoomState::Created,
            admin_id,
            admin_departed: false,
            teardown: false,
            options,
            max_players,
            patterns: game.patterns.clone(),
            multipliers: game.multipliers.clone(),
            players: BTreeMap::new(),
            caller,
            engine,
            scheduler,
            winners: Vec::new(),
            won: HashSet::new(),
            created_at: now_millis(),
            started_at: None,
            ended_at: None,
            ended_instant: None,
            end_reason: None,
            effects: Vec::new(),
        })
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    /// Takes the effects queued by the last command.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Drops queued effects after a failed command.
    pub(crate) fn discard_effects(&mut self) {
        self.effects.clear();
    }

    fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    fn publish_room_update(&mut self, audience: Audience) {
        let event = Event::RoomUpdate {
            room: Box::new(self.snapshot()),
        };
        self.emit(Effect::Publish(audience, event));
    }

    fn publish_player(&mut self, player: PlayerView) {
        let id = player.player_id;
        self.emit(Effect::Publish(
            Audience::Player(id),
            Event::PlayerUpdate {
                room_id: self.id,
                player: Box::new(player.clone()),
            },
        ));
        self.emit(Effect::SavePlayer(player));
    }

    fn transition(&mut self, target: RoomState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "{} -> {target} skips a state",
            self.state
        );
        info!(room_id = %self.id, from = %self.state, to = %target, "room state changed");
        self.state = target;
    }

    fn wrong_state(&self, op: &'static str) -> RoomError {
        RoomError::WrongState {
            room: self.id,
            state: self.state,
            op,
        }
    }

    fn authorize(&self, admin: PlayerId) -> Result<(), RoomError> {
        if self.admin_departed || admin != self.admin_id {
            return Err(RoomError::NotAdmin(admin, self.id));
        }
        Ok(())
    }

    /// `Created → Waiting`. The room is announced to its admin.
    pub fn open(&mut self) -> Result<RoomSnapshot, RoomError> {
        if self.state != RoomState::Created {
            return Err(self.wrong_state("open"));
        }
        self.transition(RoomState::Waiting);
        self.publish_room_update(Audience::Room);
        let snapshot = self.snapshot();
        self.emit(Effect::SaveRoom(snapshot.clone()));
        Ok(snapshot)
    }

    /// Seats a player and deals them a ticket. A player who already has a
    /// seat keeps it and their ticket; only the connection is rebound.
    pub fn join(&mut self, req: JoinRequest) -> Result<JoinOutcome, RoomError> {
        if !self.state.is_joinable() || self.admin_departed {
            return Err(RoomError::NotJoinable(self.id, self.state));
        }

        if let Some(player) = self.players.get_mut(&req.player_id) {
            player.touch();
            let view = player.view();
            self.emit(Effect::BindOrigin);
            self.emit(Effect::Publish(
                Audience::Player(req.player_id),
                Event::PlayerUpdate {
                    room_id: self.id,
                    player: Box::new(view.clone()),
                },
            ));
            self.publish_room_update(Audience::Origin);
            debug!(room_id = %self.id, player_id = %req.player_id, "player rejoined");
            return Ok(JoinOutcome {
                snapshot: self.snapshot(),
                player: view,
                rejoined: true,
            });
        }

        if req.stake != self.stake {
            return Err(RoomError::InvalidStake(req.stake));
        }
        if !self.options.public {
            match (&self.options.password, &req.password) {
                (_, None) => return Err(RoomError::NotPublic(self.id)),
                (Some(expected), Some(given)) if expected == given => {}
                _ => return Err(RoomError::WrongPassword(self.id)),
            }
        }
        if self.players.len() >= self.max_players {
            return Err(RoomError::RoomFull(self.id));
        }
        let ticket = self
            .engine
            .generate()
            .ok_or(RoomError::CapacityExceeded(self.id))?;

        let mut player = Player::new(req.player_id, req.name, req.phone, self.id, req.stake);
        player.ticket = Some(ticket);
        if let Some(payment) = req.payment {
            if payment.is_completed() {
                player.record_payment(payment.amount);
            }
            self.emit(Effect::SavePayment(payment));
        }
        let view = player.view();
        self.players.insert(req.player_id, player);
        info!(
            room_id = %self.id,
            player_id = %req.player_id,
            players = self.players.len(),
            "player joined"
        );

        self.emit(Effect::BindOrigin);
        self.publish_player(view.clone());
        self.publish_room_update(Audience::Room);
        Ok(JoinOutcome {
            snapshot: self.snapshot(),
            player: view,
            rejoined: false,
        })
    }

    /// Gives up a seat. When the admin leaves, the room stops taking admin
    /// commands and new players; a room that never started is torn down.
    pub fn leave(&mut self, player_id: PlayerId) -> Result<RoomSnapshot, RoomError> {
        let is_admin = player_id == self.admin_id && !self.admin_departed;
        let seated = self.players.contains_key(&player_id);
        if !is_admin && !seated {
            return Err(RoomError::NotInRoom(player_id, self.id));
        }

        if let Some(mut player) = self.players.remove(&player_id) {
            self.engine.release();
            player.room_id = None;
            player.touch();
            self.emit(Effect::SavePlayer(player.view()));
            info!(
                room_id = %self.id,
                %player_id,
                players = self.players.len(),
                "player left"
            );
        }
        if is_admin {
            self.admin_departed = true;
            if self.state == RoomState::Waiting {
                self.teardown = true;
            }
            warn!(room_id = %self.id, teardown = self.teardown, "admin left the room");
        }

        self.publish_room_update(Audience::Room);
        self.emit(Effect::Unbind(player_id));
        Ok(self.snapshot())
    }

    /// `Waiting → Active`. Arms the draw timer in automatic mode.
    pub fn start(&mut self, admin: PlayerId) -> Result<RoomSnapshot, RoomError> {
        self.authorize(admin)?;
        if self.state != RoomState::Waiting {
            return Err(self.wrong_state("start"));
        }
        self.transition(RoomState::Active);
        self.started_at = Some(now_millis());
        if self.options.call_mode.is_automatic() {
            self.scheduler.start();
        }
        self.publish_room_update(Audience::Room);
        Ok(self.snapshot())
    }

    /// A manual draw requested by the admin.
    pub fn call_number(&mut self, admin: PlayerId) -> Result<Draw, RoomError> {
        self.authorize(admin)?;
        if self.state != RoomState::Active {
            return Err(self.wrong_state("call a number in"));
        }
        if self.options.call_mode.is_automatic() {
            return Err(RoomError::WrongMode(self.id));
        }
        self.draw()
    }

    /// A draw fired by the room's timer. Stops the timer if the room is no
    /// longer in a state to draw.
    pub fn auto_draw(&mut self) -> Result<Draw, RoomError> {
        if self.state != RoomState::Active || !self.options.call_mode.is_automatic() {
            self.scheduler.stop();
            return Err(self.wrong_state("draw in"));
        }
        self.draw()
    }

    fn draw(&mut self) -> Result<Draw, RoomError> {
        let draw = self
            .caller
            .call_next()
            .map_err(|_| RoomError::PoolExhausted(self.id))?;
        debug!(room_id = %self.id, number = draw.number, remaining = draw.remaining, "number called");
        self.emit(Effect::Publish(
            Audience::Room,
            Event::NumberCalled {
                room_id: self.id,
                number: draw.number,
                sequence: draw.sequence,
                remaining: draw.remaining,
            },
        ));
        if self.caller.is_exhausted() {
            self.finish(EndReason::PoolExhausted);
        }
        Ok(draw)
    }

    /// Marks a called number on the player's ticket. Numbers that are not
    /// on the ticket are accepted and change nothing.
    pub fn mark(&mut self, player_id: PlayerId, number: u8) -> Result<PlayerView, RoomError> {
        if !self.caller.in_range(number) {
            return Err(RoomError::InvalidNumber(number));
        }
        if !self.players.contains_key(&player_id) {
            return Err(RoomError::NotInRoom(player_id, self.id));
        }
        if self.state != RoomState::Active {
            return Err(self.wrong_state("mark a number in"));
        }
        let called = self.caller.called();
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(RoomError::NotInRoom(player_id, self.id))?;
        let ticket = player
            .ticket
            .as_mut()
            .ok_or_else(|| RoomError::Internal(format!("{player_id} has no ticket")))?;
        if TicketEngine::mark(ticket, number, called) == MarkOutcome::NotCalled {
            return Err(RoomError::NumberNotCalled(number));
        }
        player.touch();
        let view = player.view();
        self.publish_player(view.clone());
        Ok(view)
    }

    /// Judges a claim and, if it holds, records the winner and pays out.
    /// Ends the room once every offered pattern is won.
    pub fn claim(&mut self, player_id: PlayerId, pattern: Pattern) -> Result<WinnerRecord, RoomError> {
        if self.state != RoomState::Active {
            return Err(self.wrong_state("claim in"));
        }
        let player_count = self.players.len() as u64;
        let player = self
            .players
            .get(&player_id)
            .ok_or(RoomError::NotInRoom(player_id, self.id))?;
        if !self.patterns.contains(&pattern) {
            return Err(RoomError::PatternNotOffered(pattern));
        }
        if self.won.contains(&pattern) {
            return Err(RoomError::AlreadyWon(pattern));
        }
        let proof = player
            .ticket
            .as_ref()
            .and_then(|t| TicketEngine::proof(t, pattern, self.caller.called()))
            .ok_or(RoomError::PatternNotSatisfied(pattern))?;

        let multiplier = self.multipliers.get(&pattern).copied().unwrap_or(0.0);
        let amount = payout(self.stake, player_count, multiplier);
        let winner = WinnerRecord {
            player_id,
            name: player.name.clone(),
            pattern,
            amount,
            timestamp: now_millis(),
            winning_numbers: proof,
        };
        self.won.insert(pattern);
        self.winners.push(winner.clone());

        let view = match self.players.get_mut(&player_id) {
            Some(player) => {
                player.credit_win(amount);
                player.touch();
                player.view()
            }
            None => return Err(RoomError::NotInRoom(player_id, self.id)),
        };
        info!(room_id = %self.id, %player_id, %pattern, amount, "pattern won");

        self.emit(Effect::Publish(
            Audience::Room,
            Event::WinnerDeclared {
                room_id: self.id,
                winner: winner.clone(),
            },
        ));
        self.publish_player(view);

        if self.patterns.iter().all(|p| self.won.contains(p)) {
            self.finish(EndReason::AllPatternsWon);
        }
        Ok(winner)
    }

    /// Pays `amount` out of a seated player's balance. Allowed in any state;
    /// winnings usually leave after the game ends.
    pub fn withdraw(&mut self, player_id: PlayerId, amount: u64) -> Result<PlayerView, RoomError> {
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(RoomError::NotInRoom(player_id, self.id))?;
        player.withdraw(amount)?;
        player.touch();
        let view = player.view();
        info!(room_id = %self.id, %player_id, amount, balance = view.balance, "withdrawal recorded");
        self.publish_player(view.clone());
        Ok(view)
    }

    /// Switches between manual and automatic calling. Before the game
    /// starts this only records the choice.
    pub fn set_call_mode(&mut self, admin: PlayerId, mode: CallMode) -> Result<RoomSnapshot, RoomError> {
        self.authorize(admin)?;
        if !matches!(self.state, RoomState::Waiting | RoomState::Active) {
            return Err(self.wrong_state("change the call mode of"));
        }
        self.options.call_mode = mode;
        match mode {
            CallMode::Automatic { interval_ms } => {
                self.scheduler.set_interval(Duration::from_millis(interval_ms));
                if self.state == RoomState::Active {
                    self.scheduler.start();
                }
            }
            CallMode::Manual => self.scheduler.stop(),
        }
        debug!(room_id = %self.id, automatic = mode.is_automatic(), "call mode changed");
        self.publish_room_update(Audience::Room);
        Ok(self.snapshot())
    }

    /// Ends the game on the admin's request. Ending an ended room is a
    /// no-op that reports the final snapshot back to the requester.
    pub fn end(&mut self, admin: PlayerId) -> Result<RoomSnapshot, RoomError> {
        self.authorize(admin)?;
        match self.state {
            RoomState::Active => self.finish(EndReason::AdminEnded),
            RoomState::Ended | RoomState::Archived => self.publish_room_update(Audience::Origin),
            RoomState::Created | RoomState::Waiting => return Err(self.wrong_state("end")),
        }
        Ok(self.snapshot())
    }

    /// `Active → Ended`. Stops the timer and flushes records.
    fn finish(&mut self, reason: EndReason) {
        self.transition(RoomState::Ended);
        self.close(reason);
    }

    fn close(&mut self, reason: EndReason) {
        self.scheduler.stop();
        self.ended_at = Some(now_millis());
        self.ended_instant = Some(Instant::now());
        self.end_reason = Some(reason);
        info!(
            room_id = %self.id,
            ?reason,
            called = self.caller.called().len(),
            winners = self.winners.len(),
            "game ended"
        );
        self.publish_room_update(Audience::Room);
        let snapshot = self.snapshot();
        self.emit(Effect::SaveRoom(snapshot));
        let views: Vec<PlayerView> = self.players.values().map(Player::view).collect();
        for view in views {
            self.emit(Effect::SavePlayer(view));
        }
    }

    /// Forces the room to `Ended` after an internal fault, from whatever
    /// state it was in.
    pub fn fail(&mut self) {
        self.effects.clear();
        if self.state.is_finished() {
            return;
        }
        warn!(room_id = %self.id, from = %self.state, "room failed, forcing end");
        self.state = RoomState::Ended;
        self.close(EndReason::InternalError);
    }

    /// `Ended → Archived`, or discards a torn-down room that never started.
    /// Either way the final records go to persistence and every subscriber
    /// is dropped.
    pub fn archive(&mut self) -> Result<RoomSnapshot, RoomError> {
        match self.state {
            RoomState::Ended => self.transition(RoomState::Archived),
            _ if self.teardown => info!(room_id = %self.id, "discarding torn-down room"),
            _ => return Err(self.wrong_state("archive")),
        }
        let snapshot = self.snapshot();
        self.emit(Effect::SaveRoom(snapshot.clone()));
        let views: Vec<PlayerView> = self.players.values().map(Player::view).collect();
        for view in views {
            self.emit(Effect::SavePlayer(view));
        }
        self.emit(Effect::UnbindAll);
        Ok(snapshot)
    }

    pub fn ticket_of(&self, player_id: PlayerId) -> Option<&Ticket> {
        self.players.get(&player_id).and_then(|p| p.ticket.as_ref())
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id,
            game_type: self.game_type.clone(),
            stake: self.stake,
            state: self.state,
            admin_id: (!self.admin_departed).then_some(self.admin_id),
            public: self.options.public,
            max_players: self.max_players,
            call_mode: self.options.call_mode,
            patterns: self.patterns.clone(),
            players: self.players.values().map(Player::summary).collect(),
            called_numbers: self.caller.called().sequence().to_vec(),
            remaining: self.caller.remaining(),
            winners: self.winners.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            end_reason: self.end_reason,
        }
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.id,
            game_type: self.game_type.clone(),
            stake: self.stake,
            state: self.state,
            public: self.options.public,
            player_count: self.players.len(),
            max_players: self.max_players,
            teardown: self.teardown,
            admin_present: !self.admin_departed,
            ended_at: self.ended_instant,
        }
    }
}

/// `stake × players × multiplier`, floored to whole units.
fn payout(stake: u64, players: u64, multiplier: f64) -> u64 {
    let raw = (stake as f64) * (players as f64) * multiplier;
    if raw.is_finite() && raw > 0.0 {
        // multipliers like 0.7 aren't exact in binary
        (raw + 1e-9).floor() as u64
    } else {
        0
    }
}
