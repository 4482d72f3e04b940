//! System-wide constants for the planner and stepper runtime.
//!
//! Internal time units are minutes (velocities are mm/min, jerk is mm/min³),
//! so segment times expressed in microseconds are converted here once.

use static_assertions::const_assert;

/// Number of axes {X, Y, Z, A, B, C}.
pub const AXES: usize = 6;

/// Number of stepper motors.
pub const MOTORS: usize = 6;

/// Number of work coordinate systems (G54..G59).
pub const COORDS: usize = 6;

// ─── Planner ring ───────────────────────────────────────────────────

/// Planner block ring capacity.
pub const PLANNER_BUFFER_POOL_SIZE: usize = 28;

/// Buffers held back before accepting a new input line.
pub const PLANNER_BUFFER_HEADROOM: usize = 4;

const_assert!(PLANNER_BUFFER_HEADROOM < PLANNER_BUFFER_POOL_SIZE);
const_assert!(PLANNER_BUFFER_POOL_SIZE <= 255);

// ─── Segment timing ─────────────────────────────────────────────────

pub const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

/// Nominal planning segment duration [µs] (~5 ms).
pub const NOM_SEGMENT_USEC: f64 = 5_000.0;
/// Minimum planning segment duration [µs].
pub const MIN_SEGMENT_USEC: f64 = 2_500.0;
/// Minimum arc segment duration [µs].
pub const MIN_ARC_SEGMENT_USEC: f64 = 10_000.0;

/// Nominal segment time [min].
pub const NOM_SEGMENT_TIME: f64 = NOM_SEGMENT_USEC / MICROSECONDS_PER_MINUTE;
/// Minimum segment time [min].
pub const MIN_SEGMENT_TIME: f64 = MIN_SEGMENT_USEC / MICROSECONDS_PER_MINUTE;
/// Minimum arc segment time [min].
pub const MIN_ARC_SEGMENT_TIME: f64 = MIN_ARC_SEGMENT_USEC / MICROSECONDS_PER_MINUTE;

/// Minimum segment time plus a scheduling margin [min].
///
/// Single-segment moves are clamped so their run time never falls below
/// this value; the 20 µs margin absorbs timer quantisation at load.
pub const MIN_SEGMENT_TIME_PLUS_MARGIN: f64 =
    (MIN_SEGMENT_USEC + 20.0) / MICROSECONDS_PER_MINUTE;

// ─── Length floors ──────────────────────────────────────────────────
//
// Must satisfy: ARC_SEGMENT_LENGTH >= MIN_LINE_LENGTH >= MIN_SEGMENT_LENGTH.

/// Arc chord target length [mm].
pub const ARC_SEGMENT_LENGTH: f64 = 0.1;
/// Smallest line the planner accepts [mm].
pub const MIN_LINE_LENGTH: f64 = 0.08;
/// Smallest accel/decel segment [mm].
pub const MIN_SEGMENT_LENGTH: f64 = 0.05;

// ─── Trapezoid solver ───────────────────────────────────────────────

/// Iteration cap for the asymmetric rate-limited case.
pub const TRAPEZOID_ITERATION_MAX: usize = 10;
/// Relative convergence threshold for the asymmetric iteration (0.10 = 10%).
pub const TRAPEZOID_ITERATION_ERROR_PERCENT: f64 = 0.10;
/// Allowable length error in the planning phase [mm].
pub const TRAPEZOID_LENGTH_FIT_TOLERANCE: f64 = 1e-4;
/// Precision within which two jerk values are considered equal [mm/min³].
pub const JERK_MATCH_PRECISION: f64 = 1000.0;

// ─── Stepper DDA ────────────────────────────────────────────────────

/// DDA tick frequency [Hz].
pub const FREQUENCY_DDA: f64 = 100_000.0;
/// Dwell timer frequency [Hz].
pub const FREQUENCY_DWELL: f64 = 1_000.0;

/// Sub-step precision of the DDA accumulator.
///
/// Fractional steps are carried across segments at this resolution; do not
/// set to 1 or interpolation accuracy is lost.
pub const DDA_SUBSTEPS: u64 = 100_000;

/// The accumulator is preserved across segments to keep pulse phase, and is
/// reset only when the new tick count falls below the previous one by more
/// than this factor (otherwise a stall is possible).
pub const ACCUMULATOR_RESET_FACTOR: u64 = 2;

// ─── Motor power ────────────────────────────────────────────────────

/// Lower bound on the motor idle timeout [s]. Must never be zero.
pub const IDLE_TIMEOUT_SECONDS_MIN: f64 = 0.1;
/// Upper bound on the motor idle timeout [s].
pub const IDLE_TIMEOUT_SECONDS_MAX: f64 = 4_294_967.0;

// ─── Units ──────────────────────────────────────────────────────────

pub const MM_PER_INCH: f64 = 25.4;
