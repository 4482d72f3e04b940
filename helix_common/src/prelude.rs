//! Prelude module for common re-exports.
//!
//! `use helix_common::prelude::*;` brings in the types nearly every
//! consumer needs without listing individual paths.

// ─── Axes ───────────────────────────────────────────────────────────
pub use crate::axis::{Axis, AxisMode};

// ─── G-code model ───────────────────────────────────────────────────
pub use crate::gcode::{
    from_millimeters, to_millimeters, CoordSystem, DistanceMode, MotionMode, PathControl, Plane,
    SpindleMode, Units,
};

// ─── States ─────────────────────────────────────────────────────────
pub use crate::state::{
    combined_state, CombinedState, CycleState, HoldState, MachineState, MotionState,
};

// ─── Status codes ───────────────────────────────────────────────────
pub use crate::status::Status;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, MachineConfig, MotorPowerMode};

// ─── System constants ───────────────────────────────────────────────
pub use crate::consts::{AXES, COORDS, MOTORS};
