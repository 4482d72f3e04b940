//! # Helix Motion Core
//!
//! The pipeline that turns canonical machining operations into jerk-limited
//! multi-axis stepper pulse trains:
//!
//! 1. **Canonical machine** ([`canon`]) — stateful NIST RS274/NGC model.
//!    Resolves incoming blocks into targets in the canonical frame
//!    (millimeters, degrees, absolute machine coordinates) and submits
//!    motion and command blocks to the planner.
//! 2. **Planner** ([`plan`]) — bounded look-ahead ring. Back-plans junction
//!    velocities under per-axis velocity/jerk limits and decomposes each
//!    block into a head/body/tail profile with constant-jerk ramps.
//! 3. **Stepper runtime** ([`stepper`]) — segment-driven DDA pulse
//!    generator with phase continuity across segments and motor power
//!    management.
//!
//! The whole controller is owned by a single [`machine::Machine`] value;
//! there is no global state. The exec → prep → load → run staging that runs
//! from interrupt context on hardware is driven here by explicit calls, so
//! hosted tests can substitute mock segment sinks and step drivers.

pub mod canon;
pub mod config;
pub mod machine;
pub mod plan;
pub mod report;
pub mod spindle;
pub mod stepper;

pub use machine::Machine;
