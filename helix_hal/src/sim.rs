//! Recording simulation driver.
//!
//! Counts signed steps per motor so tests can check pulse conservation
//! against commanded step totals, and keeps the last spindle duty and the
//! enable state of each motor.

use tracing::trace;

use helix_common::consts::MOTORS;

use crate::driver::StepDriver;

/// Simulation driver that records every emitted pulse.
#[derive(Debug, Default)]
pub struct SimDriver {
    /// Signed step count per motor (reverse steps count negative).
    pub steps: [i64; MOTORS],
    /// Unsigned pulse count per motor.
    pub pulses: [u64; MOTORS],
    /// Latched direction per motor.
    pub reverse: [bool; MOTORS],
    /// Enable line state per motor.
    pub enabled: [bool; MOTORS],
    /// Last commanded spindle duty.
    pub spindle_duty: f64,
}

impl SimDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset recorded pulse counts, keeping line states.
    pub fn clear_counts(&mut self) {
        self.steps = [0; MOTORS];
        self.pulses = [0; MOTORS];
    }
}

impl StepDriver for SimDriver {
    fn set_direction(&mut self, motor: usize, reverse: bool) {
        self.reverse[motor] = reverse;
    }

    fn step(&mut self, motor: usize) {
        self.pulses[motor] += 1;
        self.steps[motor] += if self.reverse[motor] { -1 } else { 1 };
    }

    fn enable(&mut self, motor: usize) {
        self.enabled[motor] = true;
    }

    fn disable(&mut self, motor: usize) {
        self.enabled[motor] = false;
    }

    fn set_spindle_duty(&mut self, duty: f64) {
        trace!(duty, "spindle duty update");
        self.spindle_duty = duty;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_signed_by_direction() {
        let mut drv = SimDriver::new();
        drv.set_direction(0, false);
        drv.step(0);
        drv.step(0);
        drv.set_direction(0, true);
        drv.step(0);
        assert_eq!(drv.steps[0], 1);
        assert_eq!(drv.pulses[0], 3);
    }

    #[test]
    fn enable_lines_track_state() {
        let mut drv = SimDriver::new();
        drv.enable(2);
        assert!(drv.enabled[2]);
        drv.disable(2);
        assert!(!drv.enabled[2]);
    }
}
