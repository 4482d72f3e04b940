//! Look-ahead motion planner.
//!
//! - [`buffer`] - the bounded block ring and its per-block state handshake
//! - [`line`] - line queueing, junction velocities and back-planning
//! - [`zoid`] - head/body/tail trapezoid solver (constant-jerk ramps)
//! - [`arc`] - arc-to-chord decomposition feeding the line planner
//! - [`exec`] - the motion runtime that slices blocks into segments

pub mod arc;
pub mod buffer;
pub mod exec;
pub mod line;
pub mod zoid;

pub use buffer::{Block, BlockRing, BlockState, Command, Payload};
pub use exec::{ExecSignal, MotionRuntime};
pub use line::Planner;

/// Floating-point zero tolerance used throughout planning [mm, mm/min].
pub const EPSILON: f64 = 1e-5;

/// True if `value` is zero to planning tolerance.
#[inline]
pub fn fp_zero(value: f64) -> bool {
    value.abs() < EPSILON
}

/// Euclidean length of a 6-axis displacement.
#[inline]
pub fn axis_vector_length(a: &[f64; helix_common::consts::AXES], b: &[f64; helix_common::consts::AXES]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
