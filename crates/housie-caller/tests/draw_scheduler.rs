//! Integration tests for the automatic draw scheduler.
//!
//! Time is paused (`start_paused = true`), so `sleep_until` resolves as
//! soon as the runtime has nothing else to do and tests run instantly.

use std::time::Duration;

use housie_caller::{DrawConfig, DrawScheduler, NumberCaller};
use tokio::time::Instant;

fn no_jitter(interval_ms: u64) -> DrawConfig {
    DrawConfig {
        interval: Duration::from_millis(interval_ms),
        initial_jitter: Duration::ZERO,
    }
}

// =========================================================================
// Config
// =========================================================================

#[test]
fn test_default_config() {
    let cfg = DrawConfig::default();
    assert_eq!(cfg.interval, Duration::from_secs(5));
    assert!(cfg.initial_jitter > Duration::ZERO);
}

#[test]
fn test_interval_clamped_to_minimum() {
    let s = DrawScheduler::new(no_jitter(1));
    assert_eq!(s.interval(), DrawConfig::MIN_INTERVAL);
}

// =========================================================================
// Stopped / started
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_new_scheduler_is_stopped_and_never_fires() {
    let mut s = DrawScheduler::new(no_jitter(1000));
    assert!(!s.is_running());
    let result = tokio::time::timeout(Duration::from_secs(60), s.wait_for_draw()).await;
    assert!(result.is_err(), "stopped scheduler should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_fires_at_configured_interval() {
    let mut s = DrawScheduler::new(no_jitter(2000));
    let t0 = Instant::now();
    s.start();

    for expected in 1..=3u64 {
        let tick = s.wait_for_draw().await;
        assert_eq!(tick.draw, expected);
        assert!(!tick.late);
        assert_eq!(t0.elapsed(), Duration::from_millis(2000 * expected));
    }
    assert_eq!(s.metrics().draws_fired, 3);
    assert_eq!(s.metrics().late_draws, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_further_draws() {
    let mut s = DrawScheduler::new(no_jitter(500));
    s.start();
    s.wait_for_draw().await;
    s.stop();
    s.stop();
    assert!(!s.is_running());

    let result = tokio::time::timeout(Duration::from_secs(10), s.wait_for_draw()).await;
    assert!(result.is_err(), "stopped scheduler must not fire");
    assert_eq!(s.metrics().draws_fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_only_delays_first_draw() {
    let mut s = DrawScheduler::new(DrawConfig {
        interval: Duration::from_millis(1000),
        initial_jitter: Duration::from_millis(300),
    });
    let t0 = Instant::now();
    s.start();
    s.wait_for_draw().await;
    let first = t0.elapsed();
    assert!(first >= Duration::from_millis(1000));
    assert!(first <= Duration::from_millis(1300));

    let t1 = Instant::now();
    s.wait_for_draw().await;
    assert_eq!(t1.elapsed(), Duration::from_millis(1000));
}

// =========================================================================
// Interval changes
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_set_interval_on_stopped_scheduler_does_not_arm() {
    let mut s = DrawScheduler::new(no_jitter(1000));
    s.set_interval(Duration::from_millis(400));
    assert!(!s.is_running());
    let result = tokio::time::timeout(Duration::from_secs(5), s.wait_for_draw()).await;
    assert!(result.is_err(), "stopped scheduler should pend");

    s.start();
    let t0 = Instant::now();
    s.wait_for_draw().await;
    assert_eq!(t0.elapsed(), Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_set_interval_rearms_running_timer() {
    let mut s = DrawScheduler::new(no_jitter(5000));
    s.start();
    s.set_interval(Duration::from_millis(700));
    let t0 = Instant::now();
    s.wait_for_draw().await;
    assert_eq!(t0.elapsed(), Duration::from_millis(700));
    assert_eq!(s.interval(), Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn test_late_wakeup_is_counted_and_rescheduled_from_now() {
    let mut s = DrawScheduler::new(no_jitter(1000));
    s.start();
    // Stall the "room" well past the deadline before polling the timer.
    tokio::time::advance(Duration::from_millis(2500)).await;
    let tick = s.wait_for_draw().await;
    assert!(tick.late);
    assert_eq!(s.metrics().late_draws, 1);

    let t0 = Instant::now();
    let tick = s.wait_for_draw().await;
    assert!(!tick.late);
    assert_eq!(t0.elapsed(), Duration::from_millis(1000));
}

// =========================================================================
// Integration: select! loop pattern (mirrors the room actor)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_draws_until_stop_command() {
    let mut scheduler = DrawScheduler::new(no_jitter(1000));
    let mut caller = NumberCaller::new(90, Some(11)).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(4);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        tx.send("stop").await.ok();
    });

    scheduler.start();
    loop {
        tokio::select! {
            biased;
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                scheduler.stop();
                break;
            }
            _ = scheduler.wait_for_draw() => {
                caller.call_next().unwrap();
            }
        }
    }

    assert_eq!(caller.called().len(), 3);
    let after = tokio::time::timeout(Duration::from_secs(10), scheduler.wait_for_draw()).await;
    assert!(after.is_err());
    assert_eq!(caller.called().len(), 3);
}
