//! Integration tests for rooms driven through the manager.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use housie_protocol::{
    CallMode, EndReason, ErrorCode, Event, Pattern, PlayerId, PlayerView, RoomId, RoomOptions,
    RoomSnapshot, RoomState, TicketView,
};
use housie_room::{
    GameConfig, JoinRequest, MemoryStore, Payment, PaymentStatus, Persistence, RoomError,
    RoomManager, StoreError,
};
use housie_session::{BroadcastBus, ConnectionRegistry, Delivery, Identity, Origin, RegistryConfig};
use housie_transport::ConnectionId;
use tokio::sync::mpsc;

const ADMIN: PlayerId = PlayerId(1000);

struct Harness {
    manager: RoomManager,
    registry: Arc<ConnectionRegistry>,
    store: Arc<MemoryStore>,
}

fn harness_with(config: GameConfig, seed: u64) -> Harness {
    let store = MemoryStore::shared();
    harness_over(config, seed, store.clone(), store)
}

/// Rooms write through `backend`; assertions read `store`.
fn harness_over(
    config: GameConfig,
    seed: u64,
    backend: Arc<dyn Persistence>,
    store: Arc<MemoryStore>,
) -> Harness {
    let registry = Arc::new(ConnectionRegistry::new(RegistryConfig::default()));
    let bus = BroadcastBus::new(Arc::clone(&registry));
    let manager = RoomManager::new(Arc::new(config), bus, backend).with_seed(seed);
    Harness {
        manager,
        registry,
        store,
    }
}

fn harness(seed: u64) -> Harness {
    harness_with(GameConfig::default(), seed)
}

fn connect(h: &Harness, conn: u64, player: PlayerId) -> (Origin, mpsc::UnboundedReceiver<Delivery>) {
    let conn = ConnectionId::new(conn);
    let (tx, rx) = mpsc::unbounded_channel();
    h.registry.register(conn, tx);
    h.registry.set_identity(conn, Identity::player(player)).unwrap();
    (Origin::new(conn, None), rx)
}

fn seat(id: u64) -> JoinRequest {
    JoinRequest {
        player_id: PlayerId(id),
        name: format!("player {id}"),
        phone: format!("555-{id:04}"),
        stake: 10,
        password: None,
        payment: None,
    }
}

fn numbers(ticket: &Option<TicketView>) -> Vec<u8> {
    ticket
        .as_ref()
        .map(|t| t.rows.iter().flatten().filter_map(|c| *c).collect())
        .unwrap_or_default()
}

fn row(ticket: &Option<TicketView>, r: usize) -> Vec<u8> {
    ticket
        .as_ref()
        .map(|t| t.rows[r].iter().filter_map(|c| *c).collect())
        .unwrap_or_default()
}

async fn create(h: &Harness, game_type: &str, options: RoomOptions) -> RoomId {
    h.manager
        .create_room(game_type, 10, ADMIN, options, None)
        .unwrap()
        .room_id
}

/// Calls numbers until every number in `wanted` is called. Returns `false`
/// if the room stopped being active first.
async fn call_until(h: &Harness, room: RoomId, wanted: &[u8]) -> bool {
    loop {
        let snap = h.manager.snapshot(room).await.unwrap();
        if snap.state != RoomState::Active {
            return false;
        }
        if wanted.iter().all(|n| snap.called_numbers.contains(n)) {
            return true;
        }
        h.manager.call_number(room, ADMIN, None).await.unwrap();
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Holds back saves of players who haven't won anything yet.
struct SlowWinlessStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl Persistence for SlowWinlessStore {
    async fn save_player(&self, player: PlayerView) -> Result<(), StoreError> {
        if player.won_amount == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.save_player(player).await
    }

    async fn get_player(&self, id: PlayerId) -> Result<Option<PlayerView>, StoreError> {
        self.inner.get_player(id).await
    }

    async fn save_room(&self, room: RoomSnapshot) -> Result<(), StoreError> {
        self.inner.save_room(room).await
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<RoomSnapshot>, StoreError> {
        self.inner.get_room(id).await
    }

    async fn save_payment(&self, payment: Payment) -> Result<(), StoreError> {
        self.inner.save_payment(payment).await
    }

    async fn get_player_payments(&self, id: PlayerId) -> Result<Vec<Payment>, StoreError> {
        self.inner.get_player_payments(id).await
    }
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn test_five_calls_without_a_line_leave_no_winners() {
    let h = harness(1);
    let room = create(&h, "classic", RoomOptions::default()).await;
    h.manager.join_room(room, seat(1), None).await.unwrap();
    h.manager.join_room(room, seat(2), None).await.unwrap();
    h.manager.start_game(room, ADMIN, None).await.unwrap();

    for _ in 0..5 {
        h.manager.call_number(room, ADMIN, None).await.unwrap();
    }

    let snap = h.manager.snapshot(room).await.unwrap();
    assert!(snap.winners.is_empty());
    assert_eq!(snap.called_numbers.len(), 5);
    assert_eq!(snap.called_numbers.iter().collect::<HashSet<_>>().len(), 5);
    assert!(snap.called_numbers.iter().all(|n| (1..=90).contains(n)));
    assert_eq!(snap.state, RoomState::Active);
}

#[tokio::test]
async fn test_full_house_pays_stake_times_players_times_multiplier() {
    for seed in 1..=10 {
        let h = harness(seed);
        let room = create(&h, "classic", RoomOptions::default()).await;
        let p1 = h.manager.join_room(room, seat(1), None).await.unwrap();
        h.manager.join_room(room, seat(2), None).await.unwrap();
        h.manager.start_game(room, ADMIN, None).await.unwrap();

        let mine = numbers(&p1.player.ticket);
        assert_eq!(mine.len(), 15);
        if !call_until(&h, room, &mine).await {
            continue;
        }
        for n in &mine {
            h.manager.mark_number(room, PlayerId(1), *n, None).await.unwrap();
        }

        let winner = h.manager.claim(room, PlayerId(1), Pattern::FullHouse, None).await.unwrap();
        assert_eq!(winner.amount, 10); // 10 × 2 × 0.5
        assert_eq!(winner.winning_numbers.len(), 15);

        let snap = h.manager.snapshot(room).await.unwrap();
        assert_eq!(snap.winners.len(), 1);
        assert_eq!(snap.winners[0].pattern, Pattern::FullHouse);
        // Other classic patterns are still open.
        assert_eq!(snap.state, RoomState::Active);
        return;
    }
    panic!("no seed completed a full house before the pool ran out");
}

#[tokio::test]
async fn test_simultaneous_top_line_claims_have_one_winner() {
    for seed in 1..=10 {
        let h = harness(seed);
        let room = create(&h, "classic", RoomOptions::default()).await;
        let p1 = h.manager.join_room(room, seat(1), None).await.unwrap();
        let p2 = h.manager.join_room(room, seat(2), None).await.unwrap();
        h.manager.start_game(room, ADMIN, None).await.unwrap();

        let top1 = row(&p1.player.ticket, 0);
        let top2 = row(&p2.player.ticket, 0);
        let both: Vec<u8> = top1.iter().chain(&top2).copied().collect();
        if !call_until(&h, room, &both).await {
            continue;
        }
        for n in &top1 {
            h.manager.mark_number(room, PlayerId(1), *n, None).await.unwrap();
        }
        for n in &top2 {
            h.manager.mark_number(room, PlayerId(2), *n, None).await.unwrap();
        }

        let (a, b) = tokio::join!(
            h.manager.claim(room, PlayerId(1), Pattern::TopLine, None),
            h.manager.claim(room, PlayerId(2), Pattern::TopLine, None),
        );
        let results = [a, b];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let lost: Vec<&RoomError> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(wins, 1);
        assert_eq!(lost, vec![&RoomError::AlreadyWon(Pattern::TopLine)]);

        let snap = h.manager.snapshot(room).await.unwrap();
        assert_eq!(snap.winners.len(), 1);
        return;
    }
    panic!("no seed called both top lines before the pool ran out");
}

#[tokio::test]
async fn test_winning_every_quick_pattern_ends_the_room() {
    for seed in 1..=10 {
        let h = harness(seed);
        let room = create(&h, "quick", RoomOptions::default()).await;
        let p1 = h.manager.join_room(room, seat(1), None).await.unwrap();
        h.manager.join_room(room, seat(2), None).await.unwrap();
        h.manager.start_game(room, ADMIN, None).await.unwrap();

        let mine = numbers(&p1.player.ticket);
        if !call_until(&h, room, &mine).await {
            continue;
        }
        for n in &mine {
            h.manager.mark_number(room, PlayerId(1), *n, None).await.unwrap();
        }

        h.manager.claim(room, PlayerId(1), Pattern::EarlyFive, None).await.unwrap();
        assert_eq!(h.manager.snapshot(room).await.unwrap().state, RoomState::Active);
        h.manager.claim(room, PlayerId(1), Pattern::FullHouse, None).await.unwrap();

        let snap = h.manager.snapshot(room).await.unwrap();
        assert_eq!(snap.state, RoomState::Ended);
        assert_eq!(snap.end_reason, Some(EndReason::AllPatternsWon));
        assert_eq!(snap.winners.len(), 2);
        let err = h.manager.call_number(room, ADMIN, None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::WrongState);
        return;
    }
    panic!("no seed completed the ticket before the pool ran out");
}

#[tokio::test]
async fn test_exhausting_the_pool_ends_the_room() {
    let h = harness(4);
    let room = create(&h, "classic", RoomOptions::default()).await;
    h.manager.join_room(room, seat(1), None).await.unwrap();
    h.manager.start_game(room, ADMIN, None).await.unwrap();

    for _ in 0..90 {
        h.manager.call_number(room, ADMIN, None).await.unwrap();
    }
    let snap = h.manager.snapshot(room).await.unwrap();
    assert_eq!(snap.state, RoomState::Ended);
    assert_eq!(snap.end_reason, Some(EndReason::PoolExhausted));
    assert!(snap.winners.is_empty());
    let mut sorted = snap.called_numbers.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (1..=90).collect::<Vec<u8>>());

    let err = h.manager.call_number(room, ADMIN, None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::WrongState);
}

// =========================================================================
// Automatic calling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_automatic_mode_draws_on_interval_and_stops_at_end() {
    let config = GameConfig {
        draw_jitter_ms: 0,
        ..GameConfig::default()
    };
    let h = harness_with(config, 5);
    let (origin, mut rx) = connect(&h, 1, PlayerId(1));
    let options = RoomOptions {
        call_mode: CallMode::Automatic { interval_ms: 1_000 },
        ..RoomOptions::default()
    };
    let room = create(&h, "classic", options).await;
    h.manager.join_room(room, seat(1), Some(origin)).await.unwrap();
    h.manager.start_game(room, ADMIN, None).await.unwrap();

    let err = h.manager.call_number(room, ADMIN, None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::WrongMode);

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(h.manager.snapshot(room).await.unwrap().called_numbers.len(), 3);

    h.manager.end_game(room, ADMIN, None).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    let snap = h.manager.snapshot(room).await.unwrap();
    assert_eq!(snap.called_numbers.len(), 3);

    let mut ended = false;
    let mut called_after_end = 0;
    while let Ok(delivery) = rx.try_recv() {
        match delivery.event {
            Event::RoomUpdate { room } if room.state == RoomState::Ended => ended = true,
            Event::NumberCalled { .. } if ended => called_after_end += 1,
            _ => {}
        }
    }
    assert!(ended);
    assert_eq!(called_after_end, 0);
}

#[tokio::test(start_paused = true)]
async fn test_switching_to_manual_stops_the_timer() {
    let config = GameConfig {
        draw_jitter_ms: 0,
        ..GameConfig::default()
    };
    let h = harness_with(config, 6);
    let room = create(&h, "classic", RoomOptions::default()).await;
    h.manager.start_game(room, ADMIN, None).await.unwrap();
    h.manager
        .set_call_mode(room, ADMIN, CallMode::Automatic { interval_ms: 500 }, None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(h.manager.snapshot(room).await.unwrap().called_numbers.len(), 2);

    h.manager.set_call_mode(room, ADMIN, CallMode::Manual, None).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.manager.snapshot(room).await.unwrap().called_numbers.len(), 2);

    h.manager.call_number(room, ADMIN, None).await.unwrap();
    assert_eq!(h.manager.snapshot(room).await.unwrap().called_numbers.len(), 3);
}

// =========================================================================
// Membership
// =========================================================================

#[tokio::test]
async fn test_one_room_per_player_until_the_first_room_ends() {
    let h = harness(7);
    let first = create(&h, "classic", RoomOptions::default()).await;
    let second = create(&h, "quick", RoomOptions::default()).await;

    h.manager.join_room(first, seat(1), None).await.unwrap();
    assert_eq!(h.manager.player_room(PlayerId(1)), Some(first));
    let err = h.manager.join_room(second, seat(1), None).await.unwrap_err();
    assert_eq!(err, RoomError::AlreadyInRoom(PlayerId(1), first));

    h.manager.start_game(first, ADMIN, None).await.unwrap();
    h.manager.end_game(first, ADMIN, None).await.unwrap();

    h.manager.join_room(second, seat(1), None).await.unwrap();
    assert_eq!(h.manager.player_room(PlayerId(1)), Some(second));
}

#[tokio::test]
async fn test_rejoin_rebinds_and_keeps_the_ticket() {
    let h = harness(8);
    let room = create(&h, "classic", RoomOptions::default()).await;
    let (old, _old_rx) = connect(&h, 1, PlayerId(1));
    let first = h.manager.join_room(room, seat(1), Some(old)).await.unwrap();

    let (new, mut new_rx) = connect(&h, 2, PlayerId(1));
    let again = h.manager.join_room(room, seat(1), Some(new.clone())).await.unwrap();
    assert!(again.rejoined);
    assert_eq!(first.player.ticket, again.player.ticket);
    assert_eq!(h.registry.room_of(new.conn), Some(room));

    let got = new_rx.recv().await.unwrap();
    assert!(matches!(got.event, Event::PlayerUpdate { .. }));
    assert_eq!(h.manager.snapshot(room).await.unwrap().players.len(), 1);
}

#[tokio::test]
async fn test_join_rejections() {
    let h = harness(9);
    let private = create(
        &h,
        "classic",
        RoomOptions {
            public: false,
            password: Some("open sesame".into()),
            ..RoomOptions::default()
        },
    )
    .await;

    let err = h.manager.join_room(private, seat(1), None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RoomNotPublic);
    // A failed join doesn't hold the player's slot.
    assert_eq!(h.manager.player_room(PlayerId(1)), None);

    let mut req = seat(1);
    req.password = Some("abracadabra".into());
    let err = h.manager.join_room(private, req.clone(), None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::WrongPassword);

    req.password = Some("open sesame".into());
    req.stake = 20;
    let err = h.manager.join_room(private, req.clone(), None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidStake);

    req.stake = 10;
    h.manager.join_room(private, req, None).await.unwrap();

    let err = h.manager.join_room(RoomId(999), seat(2), None).await.unwrap_err();
    assert_eq!(err, RoomError::NotFound(RoomId(999)));
}

#[tokio::test]
async fn test_full_room() {
    let h = harness(10);
    let room = create(
        &h,
        "classic",
        RoomOptions {
            max_players: Some(2),
            ..RoomOptions::default()
        },
    )
    .await;
    h.manager.join_room(room, seat(1), None).await.unwrap();
    h.manager.join_room(room, seat(2), None).await.unwrap();
    let err = h.manager.join_room(room, seat(3), None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RoomFull);
}

#[tokio::test]
async fn test_leave_frees_the_slot() {
    let h = harness(11);
    let room = create(&h, "classic", RoomOptions::default()).await;
    let (origin, _rx) = connect(&h, 1, PlayerId(1));
    h.manager.join_room(room, seat(1), Some(origin.clone())).await.unwrap();

    let snap = h.manager.leave_room(room, PlayerId(1), None).await.unwrap();
    assert!(snap.players.is_empty());
    assert_eq!(h.manager.player_room(PlayerId(1)), None);
    assert_eq!(h.registry.room_of(origin.conn), None);

    let err = h.manager.leave_room(room, PlayerId(1), None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotInRoom);
}

#[tokio::test]
async fn test_admin_commands_need_the_admin() {
    let h = harness(12);
    let room = create(&h, "classic", RoomOptions::default()).await;
    h.manager.join_room(room, seat(1), None).await.unwrap();
    for err in [
        h.manager.start_game(room, PlayerId(1), None).await.unwrap_err(),
        h.manager.end_game(room, PlayerId(1), None).await.unwrap_err(),
        h.manager.call_number(room, PlayerId(1), None).await.unwrap_err(),
    ] {
        assert_eq!(err.code(), ErrorCode::NotAdmin);
    }
    let err = h.manager.end_game(room, ADMIN, None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::WrongState);
}

#[tokio::test]
async fn test_create_room_validates_against_config() {
    let h = harness(13);
    let err = h
        .manager
        .create_room("bingo", 10, ADMIN, RoomOptions::default(), None)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidGameType);
    let err = h
        .manager
        .create_room("classic", 7, ADMIN, RoomOptions::default(), None)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidStake);
    assert_eq!(h.manager.room_count(), 0);
}

// =========================================================================
// Lobby, teardown, retention
// =========================================================================

#[tokio::test]
async fn test_list_rooms_shows_only_open_public_rooms() {
    let h = harness(14);
    let open = create(&h, "classic", RoomOptions::default()).await;
    let private = create(
        &h,
        "classic",
        RoomOptions {
            public: false,
            ..RoomOptions::default()
        },
    )
    .await;
    let ended = create(&h, "quick", RoomOptions::default()).await;
    h.manager.start_game(ended, ADMIN, None).await.unwrap();
    h.manager.end_game(ended, ADMIN, None).await.unwrap();
    h.manager.join_room(open, seat(1), None).await.unwrap();

    let rooms = h.manager.list_rooms().await;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].room_id, open);
    assert_eq!(rooms[0].player_count, 1);
    assert!(rooms.iter().all(|r| r.room_id != private));
}

#[tokio::test]
async fn test_admin_leaving_a_waiting_room_tears_it_down() {
    let h = harness(15);
    let room = create(&h, "classic", RoomOptions::default()).await;
    h.manager.join_room(room, seat(1), None).await.unwrap();
    h.manager.leave_room(room, ADMIN, None).await.unwrap();

    let err = h.manager.join_room(room, seat(2), None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RoomNotJoinable);
    assert!(h.manager.list_rooms().await.is_empty());

    let removed = h.manager.archive_expired(Duration::from_secs(3600)).await;
    assert_eq!(removed, vec![room]);
    assert_eq!(h.manager.room_count(), 0);
    assert_eq!(h.manager.player_room(PlayerId(1)), None);
    let err = h.manager.snapshot(room).await.unwrap_err();
    assert_eq!(err, RoomError::NotFound(room));
}

#[tokio::test(start_paused = true)]
async fn test_ended_rooms_are_archived_after_retention() {
    let h = harness(16);
    let room = create(&h, "classic", RoomOptions::default()).await;
    let (origin, _rx) = connect(&h, 1, PlayerId(1));
    h.manager.join_room(room, seat(1), Some(origin.clone())).await.unwrap();
    h.manager.start_game(room, ADMIN, None).await.unwrap();
    h.manager.end_game(room, ADMIN, None).await.unwrap();

    let retention = Duration::from_secs(60);
    assert!(h.manager.archive_expired(retention).await.is_empty());

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(h.manager.archive_expired(retention).await, vec![room]);
    assert_eq!(h.manager.room_count(), 0);
    assert_eq!(h.registry.room_of(origin.conn), None);

    settle().await;
    let stored = h.store.get_room(room).await.unwrap().unwrap();
    assert_eq!(stored.state, RoomState::Archived);
    let player = h.store.get_player(PlayerId(1)).await.unwrap().unwrap();
    assert_eq!(player.room_id, Some(room));
}

#[tokio::test]
async fn test_paid_join_records_payment_and_balance() {
    let h = harness(17);
    let room = create(&h, "classic", RoomOptions::default()).await;
    let mut req = seat(1);
    req.payment = Some(
        Payment::new(PlayerId(1), 10, "upi", PaymentStatus::Completed).with_transaction_id("tx-42"),
    );
    let outcome = h.manager.join_room(room, req, None).await.unwrap();
    assert_eq!(outcome.player.payment, 10);
    assert_eq!(outcome.player.balance, 10);

    settle().await;
    let payments = h.store.get_player_payments(PlayerId(1)).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].transaction_id.as_deref(), Some("tx-42"));
    let saved = h.store.get_player(PlayerId(1)).await.unwrap().unwrap();
    assert_eq!(saved.balance, 10);
}

#[tokio::test]
async fn test_withdrawal_comes_out_of_the_balance() {
    let h = harness(18);
    let room = create(&h, "classic", RoomOptions::default()).await;
    let mut req = seat(1);
    req.payment = Some(Payment::new(PlayerId(1), 10, "upi", PaymentStatus::Completed));
    h.manager.join_room(room, req, None).await.unwrap();

    let view = h.manager.withdraw(room, PlayerId(1), 4, None).await.unwrap();
    assert_eq!((view.payment, view.withdrawn, view.balance), (10, 4, 6));

    let err = h.manager.withdraw(room, PlayerId(1), 7, None).await.unwrap_err();
    assert_eq!(
        err,
        RoomError::InsufficientBalance {
            requested: 7,
            balance: 6
        }
    );
    assert_eq!(err.code(), ErrorCode::InsufficientBalance);
    assert_eq!(
        h.manager.withdraw(room, PlayerId(2), 1, None).await.unwrap_err(),
        RoomError::NotInRoom(PlayerId(2), room)
    );

    settle().await;
    let saved = h.store.get_player(PlayerId(1)).await.unwrap().unwrap();
    assert_eq!(saved.withdrawn, 4);
    assert_eq!(saved.balance, 6);
}

#[tokio::test(start_paused = true)]
async fn test_slow_saves_never_overwrite_newer_player_records() {
    for seed in 1..=10 {
        let store = MemoryStore::shared();
        let backend = Arc::new(SlowWinlessStore {
            inner: Arc::clone(&store),
        });
        let h = harness_over(GameConfig::default(), seed, backend, store);
        let room = create(&h, "quick", RoomOptions::default()).await;
        let joined = h.manager.join_room(room, seat(1), None).await.unwrap();
        h.manager.start_game(room, ADMIN, None).await.unwrap();

        let five: Vec<u8> = numbers(&joined.player.ticket).into_iter().take(5).collect();
        if !call_until(&h, room, &five).await {
            continue;
        }
        for n in &five {
            h.manager.mark_number(room, PlayerId(1), *n, None).await.unwrap();
        }
        let winner = h.manager.claim(room, PlayerId(1), Pattern::EarlyFive, None).await.unwrap();
        assert_eq!(winner.amount, 2); // floor(10 × 1 × 0.2)

        // Every queued save has finished well before this.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let saved = h.store.get_player(PlayerId(1)).await.unwrap().unwrap();
        assert_eq!(saved.won_amount, 2);
        assert_eq!(saved.balance, 2);
        assert_eq!(saved.balance, saved.payment + saved.won_amount - saved.withdrawn);
        return;
    }
    panic!("no seed called five ticket numbers before the pool ran out");
}
