//! Loaded and validated configuration.
//!
//! Wraps the shared [`MachineConfig`] with the values derived at load time
//! so the hot paths never recompute them: steps-per-unit, motor→axis
//! mapping, polarity and power mode per motor, and the clamped idle timeout.

use std::path::Path;

use helix_common::axis::{Axis, AxisMode};
use helix_common::config::{AxisConfig, ConfigError, ConfigLoader, MachineConfig, MotorPowerMode};
use helix_common::consts::{IDLE_TIMEOUT_SECONDS_MAX, IDLE_TIMEOUT_SECONDS_MIN, MOTORS};
use helix_common::gcode::CoordSystem;

/// Validated configuration plus derived per-motor values.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub machine: MachineConfig,
    /// Steps per mm (steps per degree for rotary axes), per motor.
    pub steps_per_unit: [f64; MOTORS],
    /// Axis driven by each motor.
    pub motor_axis: [Axis; MOTORS],
    /// Step direction inversion per motor.
    pub polarity: [bool; MOTORS],
    /// Power management mode per motor.
    pub power_mode: [MotorPowerMode; MOTORS],
    /// Motor idle timeout, clamped to the permitted range [s].
    pub motor_idle_timeout: f64,
}

impl LoadedConfig {
    /// Validate a machine config and derive the runtime values.
    pub fn from_machine(machine: MachineConfig) -> Result<Self, ConfigError> {
        machine.validate()?;

        let mut steps_per_unit = [0.0; MOTORS];
        let mut motor_axis = [Axis::X; MOTORS];
        let mut polarity = [false; MOTORS];
        let mut power_mode = [MotorPowerMode::default(); MOTORS];
        for (m, motor) in machine.motors.iter().enumerate() {
            steps_per_unit[m] = motor.steps_per_unit();
            motor_axis[m] = motor.axis;
            polarity[m] = motor.polarity;
            power_mode[m] = motor.power_mode;
        }

        let motor_idle_timeout = machine
            .motor_idle_timeout
            .clamp(IDLE_TIMEOUT_SECONDS_MIN, IDLE_TIMEOUT_SECONDS_MAX);

        Ok(Self {
            machine,
            steps_per_unit,
            motor_axis,
            polarity,
            power_mode,
            motor_idle_timeout,
        })
    }

    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_machine(MachineConfig::load(path)?)
    }

    /// Per-axis configuration.
    #[inline]
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        &self.machine.axes[axis.index()]
    }

    /// Operating mode of `axis`.
    #[inline]
    pub fn axis_mode(&self, axis: Axis) -> AxisMode {
        self.machine.axes[axis.index()].mode
    }

    /// Configured work offset (zero for G53).
    #[inline]
    pub fn offset(&self, coord: CoordSystem, axis: Axis) -> f64 {
        self.machine.offset(coord, axis)
    }
}

impl Default for LoadedConfig {
    fn default() -> Self {
        Self::from_machine(MachineConfig::default()).expect("default config is valid")
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_steps_per_unit() {
        let cfg = LoadedConfig::default();
        // 1.8° motor, 8 microsteps, 5 mm/rev ballscrew.
        assert!((cfg.steps_per_unit[0] - 320.0).abs() < 1e-9);
        assert_eq!(cfg.motor_axis[2], Axis::Z);
    }

    #[test]
    fn idle_timeout_is_clamped() {
        let mut machine = MachineConfig::default();
        machine.motor_idle_timeout = 1.0;
        let cfg = LoadedConfig::from_machine(machine).unwrap();
        assert_eq!(cfg.motor_idle_timeout, 1.0);
    }

    #[test]
    fn invalid_machine_config_is_rejected() {
        let mut machine = MachineConfig::default();
        machine.axes[0].jerk_max = 0.0;
        assert!(LoadedConfig::from_machine(machine).is_err());
    }
}
