//! Configuration types, loading and validation.
//!
//! One TOML file describes the whole machine: per-axis kinematic limits,
//! per-motor drive geometry, coordinate-system offsets, modal defaults,
//! planner tuning and spindle PWM calibration. Loading goes through the
//! [`ConfigLoader`] trait; semantic validation is a separate `validate()`
//! pass so in-memory configs built by tests follow the same rules.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::axis::{Axis, AxisMode};
use crate::consts::{AXES, COORDS, IDLE_TIMEOUT_SECONDS_MAX, IDLE_TIMEOUT_SECONDS_MIN, MOTORS};
use crate::gcode::{CoordSystem, DistanceMode, PathControl, Plane, Units};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Trait for loading configuration from TOML files.
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: Sized + serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Per-axis configuration ─────────────────────────────────────────

/// Kinematic limits and mode for one axis.
///
/// Linear axes are configured in mm and mm/min; rotary axes in degrees and
/// deg/min. Jerk is mm/min³ (deg/min³ for rotary).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisConfig {
    /// Operating mode.
    #[serde(default)]
    pub mode: AxisMode,
    /// Maximum traverse velocity [mm/min].
    pub velocity_max: f64,
    /// Maximum feed velocity [mm/min].
    pub feedrate_max: f64,
    /// Negative travel limit [mm].
    pub travel_min: f64,
    /// Positive travel limit [mm].
    pub travel_max: f64,
    /// Maximum jerk [mm/min³].
    pub jerk_max: f64,
    /// Cornering deviation contribution at junctions [mm].
    pub junction_deviation: f64,
    /// Rotary radius for `AxisMode::Radius` conversion [mm].
    #[serde(default)]
    pub radius: f64,
}

// ─── Per-motor configuration ────────────────────────────────────────

/// Motor power management mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotorPowerMode {
    /// Fully powered for the duration of a cycle.
    #[default]
    EnergizedDuringCycle,
    /// Idled shortly after the motor stops, even mid-cycle.
    IdleWhenStopped,
    /// Vref current reduction while idle.
    ReducedWhenIdle,
    /// Current adjusted with velocity.
    Dynamic,
}

/// Drive geometry and power mode for one motor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotorConfig {
    /// The axis this motor drives.
    pub axis: Axis,
    /// Full step angle [deg].
    pub step_angle: f64,
    /// Travel per motor revolution [mm] (degrees for rotary axes).
    pub travel_per_rev: f64,
    /// Microstep divisor (1, 2, 4 or 8).
    pub microsteps: u32,
    /// Reverse the step direction sense.
    #[serde(default)]
    pub polarity: bool,
    /// Power management mode.
    #[serde(default)]
    pub power_mode: MotorPowerMode,
}

impl MotorConfig {
    /// Steps per unit of travel (steps/mm, or steps/deg for rotary axes).
    #[inline]
    pub fn steps_per_unit(&self) -> f64 {
        360.0 / (self.step_angle / self.microsteps as f64) / self.travel_per_rev
    }
}

// ─── Spindle PWM calibration ────────────────────────────────────────

/// Linear speed→duty calibration for the spindle PWM channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpindlePwm {
    /// PWM base frequency [Hz].
    pub frequency: f64,
    pub cw_speed_lo: f64,
    pub cw_speed_hi: f64,
    pub cw_phase_lo: f64,
    pub cw_phase_hi: f64,
    pub ccw_speed_lo: f64,
    pub ccw_speed_hi: f64,
    pub ccw_phase_lo: f64,
    pub ccw_phase_hi: f64,
    /// Duty cycle while the spindle is off.
    pub phase_off: f64,
}

// ─── Modal defaults and planner tuning ──────────────────────────────

/// Power-on modal defaults, restored by M2/M30.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct ModalDefaults {
    pub units: Units,
    pub coord_system: CoordSystem,
    pub plane: Plane,
    pub path_control: PathControl,
    pub distance_mode: DistanceMode,
}

/// Planner tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerSettings {
    /// Centripetal acceleration budget at junctions [mm/min²].
    ///
    /// A lower value yields more cornering slowdown.
    pub junction_acceleration: f64,
    /// Maximum chord error when flattening arcs [mm].
    pub chord_tolerance: f64,
}

// ─── Machine configuration ──────────────────────────────────────────

/// Complete machine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineConfig {
    /// Machine display name.
    pub name: String,
    /// Motor idle timeout [s].
    pub motor_idle_timeout: f64,
    /// Work coordinate offsets, G54..G59 by row [mm].
    ///
    /// G53 is the machine frame and has no configurable offset. Kept
    /// ahead of the table-valued fields so TOML serialization stays
    /// well-formed.
    pub offsets: [[f64; AXES]; COORDS],
    pub defaults: ModalDefaults,
    pub planner: PlannerSettings,
    pub spindle: SpindlePwm,
    /// Per-axis configuration, X..C order.
    pub axes: [AxisConfig; AXES],
    /// Per-motor configuration.
    pub motors: [MotorConfig; MOTORS],
}

impl MachineConfig {
    /// The configured offset of `axis` in `coord` (zero for G53).
    #[inline]
    pub fn offset(&self, coord: CoordSystem, axis: Axis) -> f64 {
        match coord.work_index() {
            Some(row) => self.offsets[row][axis.index()],
            None => 0.0,
        }
    }

    /// Semantic validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` on the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError("name cannot be empty".into()));
        }
        if self.motor_idle_timeout < IDLE_TIMEOUT_SECONDS_MIN
            || self.motor_idle_timeout > IDLE_TIMEOUT_SECONDS_MAX
        {
            return Err(ConfigError::ValidationError(format!(
                "motor_idle_timeout {} outside [{IDLE_TIMEOUT_SECONDS_MIN}, {IDLE_TIMEOUT_SECONDS_MAX}]",
                self.motor_idle_timeout
            )));
        }
        if self.planner.junction_acceleration <= 0.0 {
            return Err(ConfigError::ValidationError(
                "junction_acceleration must be positive".into(),
            ));
        }
        if self.planner.chord_tolerance <= 0.0 {
            return Err(ConfigError::ValidationError(
                "chord_tolerance must be positive".into(),
            ));
        }

        for (i, axis_cfg) in self.axes.iter().enumerate() {
            let axis = Axis::from_index(i).expect("axis index in range");
            if !axis_cfg.mode.is_active() {
                continue;
            }
            if axis_cfg.velocity_max <= 0.0 || axis_cfg.feedrate_max <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "axis {axis:?}: velocity_max and feedrate_max must be positive"
                )));
            }
            if axis_cfg.jerk_max <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "axis {axis:?}: jerk_max must be positive"
                )));
            }
            if axis_cfg.travel_max <= axis_cfg.travel_min {
                return Err(ConfigError::ValidationError(format!(
                    "axis {axis:?}: travel_max must exceed travel_min"
                )));
            }
            if axis_cfg.mode == AxisMode::Radius {
                if !axis.is_rotary() {
                    return Err(ConfigError::ValidationError(format!(
                        "axis {axis:?}: radius mode applies to rotary axes only"
                    )));
                }
                if axis_cfg.radius <= 0.0 {
                    return Err(ConfigError::ValidationError(format!(
                        "axis {axis:?}: radius mode requires a positive radius"
                    )));
                }
            }
        }

        for (i, motor) in self.motors.iter().enumerate() {
            if !matches!(motor.microsteps, 1 | 2 | 4 | 8) {
                return Err(ConfigError::ValidationError(format!(
                    "motor {i}: microsteps must be 1, 2, 4 or 8"
                )));
            }
            if motor.step_angle <= 0.0 || motor.travel_per_rev <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "motor {i}: step_angle and travel_per_rev must be positive"
                )));
            }
        }

        let s = &self.spindle;
        if s.cw_speed_hi <= s.cw_speed_lo || s.ccw_speed_hi <= s.ccw_speed_lo {
            return Err(ConfigError::ValidationError(
                "spindle speed_hi must exceed speed_lo".into(),
            ));
        }
        if s.frequency < 0.0 {
            return Err(ConfigError::ValidationError(
                "spindle frequency must not be negative".into(),
            ));
        }

        Ok(())
    }
}

impl Default for MachineConfig {
    /// Simulation defaults: a metric gantry with 1.8° motors at 8 microsteps.
    fn default() -> Self {
        let linear = AxisConfig {
            mode: AxisMode::Standard,
            velocity_max: 16_000.0,
            feedrate_max: 16_000.0,
            travel_min: -500.0,
            travel_max: 500.0,
            jerk_max: 5.0e9,
            junction_deviation: 0.05,
            radius: 0.0,
        };
        let rotary = AxisConfig {
            mode: AxisMode::Standard,
            velocity_max: 36_000.0,
            feedrate_max: 36_000.0,
            travel_min: -100_000.0,
            travel_max: 100_000.0,
            jerk_max: 5.0e9,
            junction_deviation: 0.05,
            radius: 0.0,
        };
        let motor = |axis: Axis, travel_per_rev: f64| MotorConfig {
            axis,
            step_angle: 1.8,
            travel_per_rev,
            microsteps: 8,
            polarity: false,
            power_mode: MotorPowerMode::EnergizedDuringCycle,
        };
        Self {
            name: "helix-sim".into(),
            motor_idle_timeout: 2.0,
            defaults: ModalDefaults::default(),
            planner: PlannerSettings {
                junction_acceleration: 100_000.0,
                chord_tolerance: 0.005,
            },
            spindle: SpindlePwm {
                frequency: 100.0,
                cw_speed_lo: 1_000.0,
                cw_speed_hi: 24_000.0,
                cw_phase_lo: 0.125,
                cw_phase_hi: 0.2,
                ccw_speed_lo: 1_000.0,
                ccw_speed_hi: 24_000.0,
                ccw_phase_lo: 0.125,
                ccw_phase_hi: 0.2,
                phase_off: 0.1,
            },
            axes: [
                linear.clone(),
                linear.clone(),
                linear,
                rotary.clone(),
                rotary.clone(),
                rotary,
            ],
            // 5 mm/rev ballscrews keep the peak step rate at velocity_max
            // (16 m/min × 320 steps/mm ≈ 85 kHz) inside the DDA frequency.
            motors: [
                motor(Axis::X, 5.0),
                motor(Axis::Y, 5.0),
                motor(Axis::Z, 5.0),
                motor(Axis::A, 360.0),
                motor(Axis::B, 360.0),
                motor(Axis::C, 360.0),
            ],
            offsets: [[0.0; AXES]; COORDS],
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        MachineConfig::default().validate().expect("defaults valid");
    }

    #[test]
    fn steps_per_unit_ballscrew() {
        let m = MotorConfig {
            axis: Axis::X,
            step_angle: 1.8,
            travel_per_rev: 5.0,
            microsteps: 8,
            polarity: false,
            power_mode: MotorPowerMode::default(),
        };
        // 360 / (1.8/8) / 5.0 = 320 steps/mm
        assert!((m.steps_per_unit() - 320.0).abs() < 1e-9);
    }

    #[test]
    fn g53_offset_is_zero() {
        let mut cfg = MachineConfig::default();
        cfg.offsets[0][0] = 10.0;
        assert_eq!(cfg.offset(CoordSystem::Absolute, Axis::X), 0.0);
        assert_eq!(cfg.offset(CoordSystem::G54, Axis::X), 10.0);
    }

    #[test]
    fn radius_mode_requires_positive_radius() {
        let mut cfg = MachineConfig::default();
        cfg.axes[Axis::A.index()].mode = AxisMode::Radius;
        cfg.axes[Axis::A.index()].radius = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ValidationError(_))
        ));
        cfg.axes[Axis::A.index()].radius = 5.0;
        cfg.validate().expect("positive radius accepted");
    }

    #[test]
    fn radius_mode_rejected_on_linear_axis() {
        let mut cfg = MachineConfig::default();
        cfg.axes[Axis::X.index()].mode = AxisMode::Radius;
        cfg.axes[Axis::X.index()].radius = 5.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_microsteps_rejected() {
        let mut cfg = MachineConfig::default();
        cfg.motors[0].microsteps = 3;
        assert!(cfg.validate().is_err());
    }
}
