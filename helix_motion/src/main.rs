//! Helix motion controller binary.
//!
//! Loads a machine configuration (or falls back to simulation defaults),
//! wires the core to the simulation step driver, runs a short
//! demonstration program and logs the resulting machine state. Useful as
//! a smoke test and as the wiring reference for a real transport.

use std::path::Path;
use std::process;

use tracing::{error, info};

use helix_common::gcode::SpindleMode;
use helix_common::status::Status;
use helix_hal::{SimDriver, StepDriver};
use helix_motion::config::LoadedConfig;
use helix_motion::Machine;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match LoadedConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load {path}: {e}");
                process::exit(1);
            }
        },
        None => {
            info!("no config path given; using simulation defaults");
            LoadedConfig::default()
        }
    };

    info!(machine = %config.machine.name, "starting");

    let mut machine = Machine::new(config);
    let mut driver = SimDriver::new();

    if let Err(status) = run_demo(&mut machine, &mut driver) {
        error!(code = status.code(), "demo program failed: {status}");
        process::exit(1);
    }

    let report = machine.status_report();
    info!(
        state = ?report.combined_state,
        x = report.position[0],
        y = report.position[1],
        steps_x = driver.steps[0],
        steps_y = driver.steps[1],
        seconds = machine.clock().as_secs_f64(),
        "demo complete"
    );
}

/// Submit one canonical operation, pumping the machine whenever the
/// planner is full — main blocking on planner capacity, hosted style.
fn submit(
    machine: &mut Machine,
    driver: &mut dyn StepDriver,
    op: impl Fn(&mut Machine) -> Result<(), Status>,
) -> Result<(), Status> {
    loop {
        match op(machine) {
            Err(Status::BufferFull) => {
                machine.pump(driver)?;
            }
            other => return other,
        }
    }
}

/// A feed square with one arc corner, spindle on.
fn run_demo(machine: &mut Machine, driver: &mut SimDriver) -> Result<(), Status> {
    machine.set_feed_rate(2400.0)?;
    submit(machine, driver, |m| m.set_spindle_speed(8000.0))?;
    submit(machine, driver, |m| m.spindle_control(SpindleMode::Cw))?;

    submit(machine, driver, |m| {
        m.straight_feed(&[Some(40.0), None, None, None, None, None])
    })?;
    submit(machine, driver, |m| {
        m.straight_feed(&[None, Some(20.0), None, None, None, None])
    })?;
    // CCW quarter arc from (40,20) to (20,40) around (20,20).
    submit(machine, driver, |m| {
        m.arc_feed(
            &[Some(20.0), Some(40.0), None, None, None, None],
            [Some(-20.0), None, None],
            None,
            false,
        )
    })?;
    submit(machine, driver, |m| {
        m.straight_feed(&[Some(0.0), Some(0.0), None, None, None, None])
    })?;
    submit(machine, driver, |m| m.spindle_control(SpindleMode::Off))?;
    submit(machine, driver, |m| m.program_end())?;

    machine.run_to_idle(driver)
}
