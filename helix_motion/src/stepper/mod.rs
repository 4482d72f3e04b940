//! Stepper runtime: prep buffer, segment load, DDA pulse generation.
//!
//! The staging chain has four phases. **Exec** (low priority) computes the
//! next segment and writes it here through [`SegmentSink`]. **Prep** turns
//! the displacement into integer DDA parameters in the one-slot prep
//! buffer. **Load** (high priority, at segment end) adopts the prep buffer
//! atomically and programs the DDA. **Run** (highest priority) ticks the
//! DDA, emitting step pulses through the [`StepDriver`] lines.
//!
//! The prep buffer is owned by exactly one of {exec, loader} at any
//! instant; the owner flag is the only handshake. The DDA substep
//! accumulator is preserved across segments so pulse phase carries over;
//! it is reset only when the tick count drops hard between segments or a
//! motor re-enters motion.

pub mod motor;

use std::time::Duration;

use bitflags::bitflags;
use tracing::trace;

use helix_common::config::MotorPowerMode;
use helix_common::consts::{
    ACCUMULATOR_RESET_FACTOR, DDA_SUBSTEPS, FREQUENCY_DDA, FREQUENCY_DWELL,
    IDLE_TIMEOUT_SECONDS_MIN, MOTORS,
};
use helix_common::status::Status;
use helix_hal::StepDriver;

use crate::config::LoadedConfig;

use self::motor::{MotorPower, MotorPowerState};

/// Where exec stages segments. Implemented by the stepper runtime's prep
/// buffer; tests substitute a recording mock.
pub trait SegmentSink {
    /// Stage a line segment: signed fractional steps per motor over the
    /// given duration [µs].
    fn prep_line(&mut self, steps: [f64; MOTORS], microseconds: f64) -> Result<(), Status>;

    /// Stage a dwell of the given duration [µs].
    fn prep_dwell(&mut self, microseconds: f64) -> Result<(), Status>;

    /// Stage a null segment (keeps the loader fed when a command block
    /// produced no motion).
    fn prep_null(&mut self);
}

bitflags! {
    /// Per-motor participation mask for the loaded segment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MotorFlags: u8 {
        const M1 = 0x01;
        const M2 = 0x02;
        const M3 = 0x04;
        const M4 = 0x08;
        const M5 = 0x10;
        const M6 = 0x20;
    }
}

impl MotorFlags {
    /// Flag bit for motor index `m`.
    #[inline]
    pub fn motor(m: usize) -> Self {
        Self::from_bits_truncate(1 << m)
    }

    /// Mask covering all motors.
    pub const ALL_MOTORS: Self = Self::all();
}

/// Prep buffer ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PrepOwner {
    /// Exec may write the next segment.
    #[default]
    Exec,
    /// A staged segment awaits the loader.
    Loader,
}

/// Staged segment kinds.
#[derive(Debug, Clone, Copy, Default)]
enum PrepKind {
    #[default]
    Null,
    Line {
        increments: [u64; MOTORS],
        reverse: [bool; MOTORS],
        active: MotorFlags,
        ticks: u64,
        ticks_x_substeps: u64,
        reset_accumulator: bool,
    },
    Dwell {
        ticks: u64,
    },
}

/// What the DDA is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RunKind {
    #[default]
    Idle,
    Line,
    Dwell,
}

#[derive(Debug, Clone, Copy, Default)]
struct MotorChannel {
    substep_accumulator: i64,
    substep_increment: u64,
    power: MotorPower,
}

/// The segment-driven stepper runtime.
#[derive(Debug)]
pub struct StepperRuntime {
    prep_owner: PrepOwner,
    prep: PrepKind,

    run_kind: RunKind,
    dda_ticks_downcount: u64,
    dda_ticks_x_substeps: u64,
    motors: [MotorChannel; MOTORS],
    prev_ticks: u64,

    polarity: [bool; MOTORS],
    power_mode: [MotorPowerMode; MOTORS],
    idle_timeout: f64,
}

impl StepperRuntime {
    pub fn new(cfg: &LoadedConfig) -> Self {
        Self {
            prep_owner: PrepOwner::Exec,
            prep: PrepKind::Null,
            run_kind: RunKind::Idle,
            dda_ticks_downcount: 0,
            dda_ticks_x_substeps: 0,
            motors: [MotorChannel::default(); MOTORS],
            prev_ticks: 0,
            polarity: cfg.polarity,
            power_mode: cfg.power_mode,
            idle_timeout: cfg.motor_idle_timeout,
        }
    }

    /// True while a segment (line or dwell) is running.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.dda_ticks_downcount != 0
    }

    /// True when exec owns the prep buffer and may stage a segment.
    #[inline]
    pub fn prep_available(&self) -> bool {
        self.prep_owner == PrepOwner::Exec
    }

    /// True when a staged segment awaits the loader.
    #[inline]
    pub fn prep_staged(&self) -> bool {
        self.prep_owner == PrepOwner::Loader && !matches!(self.prep, PrepKind::Null)
    }

    /// Power state of motor `m`.
    pub fn motor_state(&self, m: usize) -> MotorPowerState {
        self.motors[m].power.state()
    }

    /// Reset DDA phase and diagnostic state (alarm recovery).
    pub fn reset(&mut self) {
        for channel in &mut self.motors {
            channel.substep_accumulator = 0;
            channel.substep_increment = 0;
        }
        self.prev_ticks = 0;
        self.run_kind = RunKind::Idle;
        self.dda_ticks_downcount = 0;
        self.prep = PrepKind::Null;
        self.prep_owner = PrepOwner::Exec;
    }

    /// Adopt the prep buffer and program the DDA. Returns `true` when a
    /// segment was loaded. Must only run while the previous segment is
    /// finished.
    pub fn load_move(&mut self, driver: &mut dyn StepDriver, now: Duration) -> bool {
        if self.is_busy() {
            return false;
        }
        let kind = std::mem::take(&mut self.prep);
        self.prep_owner = PrepOwner::Exec;

        match kind {
            PrepKind::Line {
                increments,
                reverse,
                active,
                ticks,
                ticks_x_substeps,
                reset_accumulator,
            } => {
                self.dda_ticks_downcount = ticks;
                self.dda_ticks_x_substeps = ticks_x_substeps;
                for m in 0..MOTORS {
                    let channel = &mut self.motors[m];
                    if active.contains(MotorFlags::motor(m)) {
                        // A motor entering motion (or a hard tick-count
                        // drop) starts at the half-phase midpoint;
                        // otherwise the accumulated phase carries over.
                        if reset_accumulator || channel.substep_increment == 0 {
                            channel.substep_accumulator = -((ticks_x_substeps / 2) as i64);
                        }
                        channel.substep_increment = increments[m];
                        driver.set_direction(m, reverse[m]);
                        driver.enable(m);
                        channel.power.run();
                    } else {
                        channel.substep_increment = 0;
                        if self.power_mode[m] == MotorPowerMode::IdleWhenStopped
                            && channel.power.state() == MotorPowerState::Running
                        {
                            channel.power.stop(now, IDLE_TIMEOUT_SECONDS_MIN);
                        }
                    }
                }
                self.run_kind = RunKind::Line;
                trace!(ticks, "segment loaded");
                true
            }
            PrepKind::Dwell { ticks } => {
                self.dda_ticks_downcount = ticks;
                self.run_kind = RunKind::Dwell;
                true
            }
            PrepKind::Null => false,
        }
    }

    /// One DDA tick: accumulate substeps, emit pulses, count down.
    pub fn run_tick(&mut self, driver: &mut dyn StepDriver) {
        if self.dda_ticks_downcount == 0 {
            return;
        }
        if self.run_kind == RunKind::Line {
            let threshold = self.dda_ticks_x_substeps as i64;
            for m in 0..MOTORS {
                let channel = &mut self.motors[m];
                if channel.substep_increment == 0 {
                    continue;
                }
                channel.substep_accumulator += channel.substep_increment as i64;
                if channel.substep_accumulator > 0 {
                    channel.substep_accumulator -= threshold;
                    driver.step(m);
                }
            }
        }
        self.dda_ticks_downcount -= 1;
        if self.dda_ticks_downcount == 0 {
            self.run_kind = RunKind::Idle;
        }
    }

    /// Run the loaded segment to completion. Returns the segment's wall
    /// duration [s] so a hosted caller can advance its clock.
    pub fn run_segment(&mut self, driver: &mut dyn StepDriver) -> f64 {
        let ticks = self.dda_ticks_downcount;
        let frequency = match self.run_kind {
            RunKind::Line => FREQUENCY_DDA,
            RunKind::Dwell => FREQUENCY_DWELL,
            RunKind::Idle => return 0.0,
        };
        while self.dda_ticks_downcount != 0 {
            self.run_tick(driver);
        }
        ticks as f64 / frequency
    }

    /// Motion has stopped (cycle end or hold): arm the idle countdowns.
    pub fn motion_stopped(&mut self, now: Duration) {
        for m in 0..MOTORS {
            let timeout = match self.power_mode[m] {
                MotorPowerMode::IdleWhenStopped => IDLE_TIMEOUT_SECONDS_MIN,
                _ => self.idle_timeout,
            };
            self.motors[m].power.stop(now, timeout);
        }
    }

    /// Periodic power management callback: advances idle countdowns and
    /// de-energizes motors whose timeout expired.
    pub fn power_callback(&mut self, driver: &mut dyn StepDriver, now: Duration) {
        for m in 0..MOTORS {
            if self.motors[m].power.poll_idle(now) {
                driver.disable(m);
            }
        }
    }

    /// Energize all motors into the stopped state.
    pub fn energize_motors(&mut self, driver: &mut dyn StepDriver, now: Duration) {
        for m in 0..MOTORS {
            driver.enable(m);
            self.motors[m].power.energize(now, self.idle_timeout);
        }
    }

    /// Remove power from all motors.
    pub fn deenergize_motors(&mut self, driver: &mut dyn StepDriver) {
        for m in 0..MOTORS {
            driver.disable(m);
            self.motors[m].power.disable();
        }
    }
}

impl SegmentSink for StepperRuntime {
    fn prep_line(&mut self, steps: [f64; MOTORS], microseconds: f64) -> Result<(), Status> {
        if self.prep_owner != PrepOwner::Exec {
            return Err(Status::Internal);
        }
        if !microseconds.is_finite() {
            return Err(Status::InternalRange);
        }
        if microseconds < 1.0 {
            return Err(Status::MinimumTimeMove);
        }

        let ticks = ((microseconds / 1_000_000.0) * FREQUENCY_DDA) as u64;
        if ticks == 0 {
            return Err(Status::MinimumTimeMove);
        }
        // Integer product, not float: rounding here accumulates position
        // error over thousands of segments.
        let ticks_x_substeps = ticks * DDA_SUBSTEPS;

        let mut increments = [0u64; MOTORS];
        let mut reverse = [false; MOTORS];
        let mut active = MotorFlags::empty();
        for m in 0..MOTORS {
            reverse[m] = (steps[m] < 0.0) ^ self.polarity[m];
            increments[m] = (steps[m].abs() * DDA_SUBSTEPS as f64) as u64;
            if increments[m] != 0 {
                active |= MotorFlags::motor(m);
            }
        }

        let reset_accumulator = ticks * ACCUMULATOR_RESET_FACTOR < self.prev_ticks;
        self.prev_ticks = ticks;

        self.prep = PrepKind::Line {
            increments,
            reverse,
            active,
            ticks,
            ticks_x_substeps,
            reset_accumulator,
        };
        self.prep_owner = PrepOwner::Loader;
        Ok(())
    }

    fn prep_dwell(&mut self, microseconds: f64) -> Result<(), Status> {
        if self.prep_owner != PrepOwner::Exec {
            return Err(Status::Internal);
        }
        let ticks = ((microseconds / 1_000_000.0) * FREQUENCY_DWELL) as u64;
        self.prep = PrepKind::Dwell { ticks: ticks.max(1) };
        self.prep_owner = PrepOwner::Loader;
        Ok(())
    }

    fn prep_null(&mut self) {
        self.prep = PrepKind::Null;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use helix_hal::SimDriver;

    const T0: Duration = Duration::from_secs(0);

    fn runtime() -> StepperRuntime {
        StepperRuntime::new(&LoadedConfig::default())
    }

    #[test]
    fn segment_emits_commanded_steps() {
        let mut st = runtime();
        let mut drv = SimDriver::new();

        let mut steps = [0.0; MOTORS];
        steps[0] = 100.0;
        steps[1] = -50.0;
        st.prep_line(steps, 5_000.0).unwrap();
        assert!(st.load_move(&mut drv, T0));
        st.run_segment(&mut drv);

        assert!((drv.steps[0] - 100).abs() <= 1);
        assert!((drv.steps[1] + 50).abs() <= 1);
        assert_eq!(drv.steps[2], 0);
    }

    #[test]
    fn fractional_steps_carry_across_segments() {
        let mut st = runtime();
        let mut drv = SimDriver::new();

        // Ten segments of 0.35 steps: 3.5 steps total, so 3 or 4 pulses —
        // the fraction must carry, not vanish.
        for _ in 0..10 {
            let mut steps = [0.0; MOTORS];
            steps[0] = 0.35;
            st.prep_line(steps, 5_000.0).unwrap();
            assert!(st.load_move(&mut drv, T0));
            st.run_segment(&mut drv);
        }
        assert!(drv.pulses[0] == 3 || drv.pulses[0] == 4, "pulses {}", drv.pulses[0]);
    }

    #[test]
    fn polarity_inverts_direction() {
        let mut cfg = LoadedConfig::default();
        cfg.polarity[0] = true;
        let mut st = StepperRuntime::new(&cfg);
        let mut drv = SimDriver::new();

        let mut steps = [0.0; MOTORS];
        steps[0] = 10.0;
        st.prep_line(steps, 5_000.0).unwrap();
        st.load_move(&mut drv, T0);
        st.run_segment(&mut drv);
        // Positive steps with inverted polarity drive the reverse line.
        assert!(drv.reverse[0]);
        assert_eq!(drv.steps[0], -(drv.pulses[0] as i64));
    }

    #[test]
    fn prep_handshake_rejects_double_stage() {
        let mut st = runtime();
        let mut steps = [0.0; MOTORS];
        steps[0] = 1.0;
        st.prep_line(steps, 5_000.0).unwrap();
        // Loader owns the buffer now; a second stage must fail.
        assert_eq!(st.prep_line(steps, 5_000.0), Err(Status::Internal));
    }

    #[test]
    fn sub_minimum_segment_time_is_rejected() {
        let mut st = runtime();
        let steps = [0.0; MOTORS];
        assert_eq!(st.prep_line(steps, 0.5), Err(Status::MinimumTimeMove));
        assert_eq!(
            st.prep_line(steps, f64::INFINITY),
            Err(Status::InternalRange)
        );
    }

    #[test]
    fn dwell_counts_down_without_pulses() {
        let mut st = runtime();
        let mut drv = SimDriver::new();
        st.prep_dwell(250_000.0).unwrap();
        assert!(st.load_move(&mut drv, T0));
        assert!(st.is_busy());
        st.run_segment(&mut drv);
        assert!(!st.is_busy());
        assert_eq!(drv.pulses, [0; MOTORS]);
    }

    #[test]
    fn idle_timeout_deenergizes_motor() {
        let mut st = runtime();
        let mut drv = SimDriver::new();

        let mut steps = [0.0; MOTORS];
        steps[0] = 10.0;
        st.prep_line(steps, 5_000.0).unwrap();
        st.load_move(&mut drv, T0);
        st.run_segment(&mut drv);
        assert_eq!(st.motor_state(0), MotorPowerState::Running);
        assert!(drv.enabled[0]);

        st.motion_stopped(Duration::from_secs(1));
        st.power_callback(&mut drv, Duration::from_secs(1));
        assert!(drv.enabled[0], "countdown must not fire early");

        // Default idle timeout is 2 s.
        st.power_callback(&mut drv, Duration::from_secs(4));
        assert_eq!(st.motor_state(0), MotorPowerState::Idle);
        assert!(!drv.enabled[0]);
    }

    #[test]
    fn accumulator_preserves_phase_between_segments() {
        let mut st = runtime();
        let mut drv = SimDriver::new();

        // Two equal segments of 10.5 steps: total pulses must be 21±1,
        // which only happens when the accumulator carries the half step.
        for _ in 0..2 {
            let mut steps = [0.0; MOTORS];
            steps[0] = 10.5;
            st.prep_line(steps, 5_000.0).unwrap();
            st.load_move(&mut drv, T0);
            st.run_segment(&mut drv);
        }
        assert!((drv.pulses[0] as i64 - 21).abs() <= 1, "pulses {}", drv.pulses[0]);
    }

    #[test]
    fn load_without_stage_is_a_noop() {
        let mut st = runtime();
        let mut drv = SimDriver::new();
        assert!(!st.load_move(&mut drv, T0));
        assert!(!st.is_busy());
    }
}
