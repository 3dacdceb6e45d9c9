//! Background maintenance tasks.
//!
//! Both run on a fixed tick independent of any room or connection, and
//! both tolerate racing the normal request path: evicting a connection
//! that already left, or archiving a room that's already gone, is a no-op.

use std::sync::Arc;
use std::time::Duration;

use housie_room::RoomManager;
use housie_session::Authenticator;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::machine::GameStateMachine;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Evicts connections that missed too many heartbeats (or failed a
/// delivery) and takes their players out of their rooms.
pub fn spawn_heartbeat_sweeper<A: Authenticator>(
    machine: Arc<GameStateMachine<A>>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every.max(MIN_SWEEP_INTERVAL));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = machine.registry().sweep(Instant::now());
            if !evicted.is_empty() {
                tracing::debug!(count = evicted.len(), "heartbeat sweep evicted connections");
            }
            for eviction in evicted {
                machine.evicted(eviction).await;
            }
        }
    })
}

/// Archives rooms that have sat in `Ended` for `retention`, and discards
/// rooms torn down before they started.
pub fn spawn_retention_sweeper(
    rooms: Arc<RoomManager>,
    every: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every.max(MIN_SWEEP_INTERVAL));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let removed = rooms.archive_expired(retention).await;
            if !removed.is_empty() {
                tracing::info!(count = removed.len(), rooms = ?removed, "retention sweep removed rooms");
            }
        }
    })
}
