//! Timer for automatic number calling.
//!
//! The scheduler sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         biased;
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = scheduler.wait_for_draw() => { /* call the next number */ }
//!     }
//! }
//! ```
//!
//! While stopped, [`DrawScheduler::wait_for_draw`] pends forever,
//! so the draw branch simply never wins. Stopping happens inside the same
//! task that awaits the timer, which means a draw can never fire after the
//! `stop()` call returns.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Timing for automatic draws.
#[derive(Debug, Clone)]
pub struct DrawConfig {
    /// Time between draws.
    pub interval: Duration,
    /// Random delay (0..jitter) added to the *first* draw after `start`, so
    /// rooms started together don't draw in lockstep.
    pub initial_jitter: Duration,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            initial_jitter: Duration::from_millis(250),
        }
    }
}

impl DrawConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamps the interval up to [`Self::MIN_INTERVAL`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "draw interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

/// Returned each time the timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawTick {
    /// Count of timer firings since the scheduler was created (starts at 1).
    pub draw: u64,
    /// `true` if the timer woke more than 10% of an interval late.
    pub late: bool,
}

/// Raw counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawMetrics {
    pub draws_fired: u64,
    pub late_draws: u64,
}

/// Drives automatic draws for a single room.
///
/// Starts stopped; the room calls [`start`](Self::start) when the game is
/// active and in automatic mode.
#[derive(Debug)]
pub struct DrawScheduler {
    config: DrawConfig,
    next_draw: Option<Instant>,
    metrics: DrawMetrics,
}

impl DrawScheduler {
    pub fn new(config: DrawConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            "draw scheduler created"
        );
        Self {
            config,
            next_draw: None,
            metrics: DrawMetrics::default(),
        }
    }

    /// Arms the timer. The first draw is due one interval (plus jitter) from
    /// now. Restarting a running scheduler re-arms it from now.
    pub fn start(&mut self) {
        let jitter = if self.config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = self.config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..max))
        };
        self.next_draw = Some(Instant::now() + self.config.interval + jitter);
        debug!(interval_ms = self.config.interval.as_millis() as u64, "draw scheduler started");
    }

    /// Disarms the timer. Idempotent; drawn state lives elsewhere and is
    /// untouched.
    pub fn stop(&mut self) {
        if self.next_draw.take().is_some() {
            debug!(fired = self.metrics.draws_fired, "draw scheduler stopped");
        }
    }

    /// Changes the interval. A running timer is re-armed from now.
    pub fn set_interval(&mut self, interval: Duration) {
        self.config.interval = interval;
        self.config = self.config.clone().validated();
        if self.next_draw.is_some() {
            self.next_draw = Some(Instant::now() + self.config.interval);
        }
    }

    /// Waits until the next draw is due.
    ///
    /// Pends forever while stopped. Cancel-safe: dropping the
    /// future before it resolves leaves the schedule unchanged.
    pub async fn wait_for_draw(&mut self) -> DrawTick {
        let Some(next) = self.next_draw else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let interval = self.config.interval;
        let late_by = now.saturating_duration_since(next);
        let late = late_by > interval / 10;
        if late {
            self.metrics.late_draws += 1;
            warn!(
                late_ms = late_by.as_secs_f64() * 1000.0,
                "automatic draw fired late, rescheduling from now"
            );
        }
        // Always schedule from now so a stall never causes a burst of draws.
        self.next_draw = Some(now + interval);
        self.metrics.draws_fired += 1;
        trace!(draw = self.metrics.draws_fired, late, "draw timer fired");

        DrawTick {
            draw: self.metrics.draws_fired,
            late,
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_draw.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn metrics(&self) -> &DrawMetrics {
        &self.metrics
    }
}
