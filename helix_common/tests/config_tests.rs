//! Configuration loading tests: TOML round-trip, defaults, validation.

use helix_common::axis::{Axis, AxisMode};
use helix_common::config::{ConfigError, ConfigLoader, MachineConfig};
use helix_common::gcode::{CoordSystem, Units};
use std::fs;
use tempfile::TempDir;

/// Serialize the default config, write it out, and load it back.
fn write_default_config(dir: &std::path::Path) -> std::path::PathBuf {
    let cfg = MachineConfig::default();
    let toml = toml::to_string(&cfg).expect("default config serializes");
    let path = dir.join("machine.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[test]
fn round_trip_preserves_config() {
    let tmp = TempDir::new().unwrap();
    let path = write_default_config(tmp.path());

    let loaded = MachineConfig::load(&path).expect("loads back");
    loaded.validate().expect("validates");

    let original = MachineConfig::default();
    assert_eq!(loaded.name, original.name);
    assert_eq!(loaded.defaults.units, original.defaults.units);
    assert_eq!(
        loaded.axes[Axis::X.index()].velocity_max,
        original.axes[Axis::X.index()].velocity_max
    );
    assert_eq!(loaded.motors[0].microsteps, original.motors[0].microsteps);
    assert_eq!(
        loaded.spindle.cw_phase_hi,
        original.spindle.cw_phase_hi
    );
}

#[test]
fn missing_file_is_file_not_found() {
    let tmp = TempDir::new().unwrap();
    let result = MachineConfig::load(&tmp.path().join("nope.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn malformed_toml_is_parse_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("machine.toml");
    fs::write(&path, "name = [unterminated").unwrap();
    assert!(matches!(
        MachineConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn unknown_fields_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write_default_config(tmp.path());
    let mut text = fs::read_to_string(&path).unwrap();
    text.push_str("\nbogus_key = 1\n");
    fs::write(&path, text).unwrap();
    assert!(matches!(
        MachineConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn edited_offsets_survive_round_trip() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = MachineConfig::default();
    cfg.offsets[0][Axis::X.index()] = 10.0; // G54 X
    cfg.offsets[5][Axis::Z.index()] = -2.5; // G59 Z

    let path = tmp.path().join("machine.toml");
    fs::write(&path, toml::to_string(&cfg).unwrap()).unwrap();

    let loaded = MachineConfig::load(&path).unwrap();
    assert_eq!(loaded.offset(CoordSystem::G54, Axis::X), 10.0);
    assert_eq!(loaded.offset(CoordSystem::G59, Axis::Z), -2.5);
    assert_eq!(loaded.offset(CoordSystem::Absolute, Axis::X), 0.0);
}

#[test]
fn validation_catches_inch_mode_radius_axis() {
    // Radius-mode axis with units default in inches still validates in mm;
    // the radius bound is what matters.
    let mut cfg = MachineConfig::default();
    cfg.defaults.units = Units::Inches;
    cfg.axes[Axis::B.index()].mode = AxisMode::Radius;
    cfg.axes[Axis::B.index()].radius = 25.4;
    cfg.validate().expect("radius axis with positive radius is valid");
}
