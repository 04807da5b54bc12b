//! Tick clock.
//!
//! Accumulates real frame time, derives the blend fraction and tells the
//! frame loop when the next snapshot is due.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TickClock {
    tick: Duration,
    since_merge: Duration,
    since_attempt: Duration,
    total: Duration,
}

impl TickClock {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            since_merge: Duration::ZERO,
            since_attempt: Duration::ZERO,
            total: Duration::ZERO,
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn advance(&mut self, dt: Duration) {
        self.since_merge += dt;
        self.since_attempt += dt;
        self.total += dt;
    }

    /// Blend fraction in [0,1]; holds at 1 until the next merge.
    pub fn fraction(&self) -> f32 {
        (self.since_merge.as_secs_f32() / self.tick.as_secs_f32()).min(1.0)
    }

    /// Whether a full tick passed since the last fetch attempt.
    pub fn fetch_due(&self) -> bool {
        self.since_attempt >= self.tick
    }

    pub fn mark_fetch_started(&mut self) {
        self.since_attempt = Duration::ZERO;
    }

    /// A snapshot was merged: restart the blend.
    pub fn on_merge(&mut self) {
        self.since_merge = Duration::ZERO;
    }

    /// Wall-clock seconds since the clock started.
    pub fn now(&self) -> f64 {
        self.total.as_secs_f64()
    }

    /// Restarts the tick cadence, keeping wall-clock time.
    pub fn restart(&mut self) {
        self.since_merge = Duration::ZERO;
        self.since_attempt = Duration::ZERO;
    }
}
