//! Motor power state machine.
//!
//! Lifecycle: `Off → Stopped (energize) → Running (motion) → Stopped
//! (motion end) → Idle (timeout) → Off (explicit disable)`. The idle
//! timeout is advanced from a periodic real-time callback, never from the
//! DDA interrupt.

use std::time::Duration;

/// Power state of one motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MotorPowerState {
    /// De-energized.
    #[default]
    Off = 0,
    /// Energized and holding, idle countdown armed.
    Stopped = 1,
    /// Stepping in the current segment.
    Running = 2,
    /// Countdown expired; power removed (or reduced) until next motion.
    Idle = 3,
}

/// Per-motor power bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotorPower {
    state: MotorPowerState,
    /// Deadline for the stopped→idle transition.
    idle_deadline: Option<Duration>,
}

impl MotorPower {
    #[inline]
    pub fn state(&self) -> MotorPowerState {
        self.state
    }

    /// Energize into `Stopped` with the countdown armed.
    pub fn energize(&mut self, now: Duration, timeout_seconds: f64) {
        self.state = MotorPowerState::Stopped;
        self.idle_deadline = Some(now + Duration::from_secs_f64(timeout_seconds));
    }

    /// The motor is stepping; cancel any countdown.
    pub fn run(&mut self) {
        self.state = MotorPowerState::Running;
        self.idle_deadline = None;
    }

    /// Motion ended; arm the idle countdown.
    pub fn stop(&mut self, now: Duration, timeout_seconds: f64) {
        if self.state == MotorPowerState::Running {
            self.energize(now, timeout_seconds);
        }
    }

    /// Explicit disable.
    pub fn disable(&mut self) {
        self.state = MotorPowerState::Off;
        self.idle_deadline = None;
    }

    /// Advance the countdown. Returns `true` exactly once, when the motor
    /// transitions `Stopped → Idle` and should be de-energized.
    pub fn poll_idle(&mut self, now: Duration) -> bool {
        if self.state == MotorPowerState::Stopped {
            if let Some(deadline) = self.idle_deadline {
                if now >= deadline {
                    self.state = MotorPowerState::Idle;
                    self.idle_deadline = None;
                    return true;
                }
            }
        }
        false
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
