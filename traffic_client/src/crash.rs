//! Crash effects.
//!
//! The server flags crashed vehicles and reports how long the effect lasts.
//! Locally the timer keeps counting down against wall-clock time so the shake
//! fades smoothly between polls. The perturbation itself is a pure function of
//! the time since the crash started and its intensity.

use traffic_shared::math::{Rgb, Vec3};

/// Used when the server flags a crash without a timer.
pub const DEFAULT_CRASH_SECONDS: f32 = 5.0;

const SHAKE_AMPLITUDE: f32 = 0.06;
const SHAKE_RATE: f32 = 47.0;
const WOBBLE_PITCH: f32 = 0.18;
const WOBBLE_ROLL: f32 = 0.12;
const WOBBLE_PITCH_RATE: f32 = 5.3;
const WOBBLE_ROLL_RATE: f32 = 4.1;
const PULSE_AMPLITUDE: f32 = 0.08;
const PULSE_RATE: f32 = 9.0;
const MAX_TINT: f32 = 0.6;
const CRASH_TINT: Rgb = Rgb::new(1.0, 0.15, 0.1);

/// Per-vehicle crash countdown.
///
/// Instants are wall-clock seconds on the visualizer's clock, kept in `f64`
/// so long sessions do not lose sub-frame precision.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CrashTimer {
    /// Last crash flag seen from the server.
    flagged: bool,
    initial: f32,
    started_at: f64,
    expires_at: f64,
}

/// Derived crash state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrashState {
    Normal,
    Crashed { intensity: f32 },
}

impl CrashTimer {
    /// Folds a server report into the timer at a tick boundary.
    ///
    /// A cleared flag ends the effect immediately. A rising flag starts a new
    /// countdown. While the flag stays set, the server can only shorten the
    /// remaining time.
    pub fn merge(&mut self, crashed: bool, reported: Option<f32>, now: f64) {
        if !crashed {
            *self = Self::default();
            return;
        }
        let reported = reported.filter(|t| t.is_finite()).map(|t| t.max(0.0));
        if !self.flagged {
            let seconds = reported.filter(|t| *t > 0.0).unwrap_or(DEFAULT_CRASH_SECONDS);
            self.flagged = true;
            self.initial = seconds;
            self.started_at = now;
            self.expires_at = now + f64::from(seconds);
        } else if let Some(seconds) = reported {
            self.expires_at = self.expires_at.min(now + f64::from(seconds));
        }
    }

    /// Seconds since the current crash started; the phase of the perturbation.
    pub fn elapsed(&self, now: f64) -> f32 {
        if !self.flagged {
            return 0.0;
        }
        (now - self.started_at).max(0.0) as f32
    }

    /// Seconds of effect left at `now`.
    pub fn remaining(&self, now: f64) -> f32 {
        if !self.flagged || self.initial <= 0.0 {
            return 0.0;
        }
        ((self.expires_at - now) as f32).clamp(0.0, self.initial)
    }

    /// 1.0 right after the crash, 0.0 once expired.
    pub fn intensity(&self, now: f64) -> f32 {
        if self.initial <= 0.0 {
            return 0.0;
        }
        self.remaining(now) / self.initial
    }

    pub fn is_crashed(&self, now: f64) -> bool {
        self.remaining(now) > 0.0
    }

    pub fn state(&self, now: f64) -> CrashState {
        let intensity = self.intensity(now);
        if intensity > 0.0 {
            CrashState::Crashed { intensity }
        } else {
            CrashState::Normal
        }
    }
}

/// Additive visual disturbance for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrashPerturbation {
    /// Offset in the vehicle's local frame (x lateral, z forward).
    pub local_offset: Vec3,
    /// Extra rotation about the x and z axes.
    pub wobble: Vec3,
    pub scale: f32,
    /// Mix factor toward the crash tint.
    pub tint: f32,
}

impl CrashPerturbation {
    pub const NONE: Self = Self {
        local_offset: Vec3::ZERO,
        wobble: Vec3::ZERO,
        scale: 1.0,
        tint: 0.0,
    };

    pub fn tint_color(&self, base: Rgb) -> Rgb {
        if self.tint <= 0.0 {
            return base;
        }
        base.mix(CRASH_TINT, self.tint)
    }
}

/// Shake, wobble, pulse and tint for a vehicle in `state`, `time` seconds into the crash.
pub fn perturbation(state: CrashState, time: f32) -> CrashPerturbation {
    let intensity = match state {
        CrashState::Normal => return CrashPerturbation::NONE,
        CrashState::Crashed { intensity } => intensity.clamp(0.0, 1.0),
    };
    if intensity <= 0.0 {
        return CrashPerturbation::NONE;
    }

    let shake = (time * SHAKE_RATE).sin() * SHAKE_AMPLITUDE * intensity;
    let pulse = 0.5 + 0.5 * (time * PULSE_RATE).sin();
    CrashPerturbation {
        local_offset: Vec3::new(shake, 0.0, 0.0),
        wobble: Vec3::new(
            (time * WOBBLE_PITCH_RATE).sin() * WOBBLE_PITCH * intensity,
            0.0,
            (time * WOBBLE_ROLL_RATE).cos() * WOBBLE_ROLL * intensity,
        ),
        scale: 1.0 + PULSE_AMPLITUDE * intensity * pulse,
        tint: MAX_TINT * intensity,
    }
}
