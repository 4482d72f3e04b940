//! The owned machine value and the exec/load/run pump.
//!
//! On hardware the staging chain is driven by two interrupt priorities and
//! a periodic callback; here [`Machine::pump`] makes those phases explicit
//! calls in the same order: arbitration, arc fill, exec (stage one
//! segment, dispatching command blocks on the way), load, run. One pump
//! call advances the machine by at most one segment, which is exactly the
//! granularity feedholds arbitrate at.

use std::time::Duration;

use tracing::debug;

use helix_common::axis::Axis;
use helix_common::consts::AXES;
use helix_common::gcode::{from_millimeters, MotionMode, SpindleMode};
use helix_common::state::{combined_state, CycleState, HoldState, MachineState, MotionState};
use helix_common::status::Status;
use helix_hal::StepDriver;

use crate::canon::model::GcodeModel;
use crate::config::LoadedConfig;
use crate::plan::arc::ArcGenerator;
use crate::plan::buffer::Command;
use crate::plan::exec::{exec_move, ExecSignal, MotionRuntime};
use crate::plan::line::Planner;
use crate::report::{Reports, StatusReport};
use crate::spindle::spindle_duty;
use crate::stepper::StepperRuntime;

/// The four raw state variables of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct States {
    pub machine: MachineState,
    pub cycle: CycleState,
    pub motion: MotionState,
    pub hold: HoldState,
}

impl Default for States {
    fn default() -> Self {
        Self {
            machine: MachineState::Ready,
            cycle: CycleState::Off,
            motion: MotionState::Stop,
            hold: HoldState::Off,
        }
    }
}

/// The complete motion controller, one owned value.
pub struct Machine {
    pub config: LoadedConfig,
    pub gm: GcodeModel,
    pub states: States,
    /// Per-axis homed flags.
    pub homed: [bool; AXES],
    /// Raised when G10 changes offsets; the config collaborator persists
    /// them to NVM after motion stops.
    pub g10_persist_flag: bool,

    pub(crate) feedhold_requested: bool,
    pub(crate) queue_flush_requested: bool,
    pub(crate) cycle_start_requested: bool,

    pub planner: Planner,
    pub arc: ArcGenerator,
    pub runtime: MotionRuntime,
    pub stepper: StepperRuntime,
    pub reports: Reports,

    /// Machine time, advanced by executed segment durations.
    clock: Duration,
}

impl Machine {
    pub fn new(config: LoadedConfig) -> Self {
        let stepper = StepperRuntime::new(&config);
        let defaults = &config.machine.defaults;
        let gm = GcodeModel {
            units: defaults.units,
            coord_system: defaults.coord_system,
            plane: defaults.plane,
            path_control: defaults.path_control,
            distance_mode: defaults.distance_mode,
            // A machine never starts in a motion mode.
            motion_mode: MotionMode::Cancel,
            ..GcodeModel::default()
        };
        Self {
            config,
            gm,
            states: States::default(),
            homed: [false; AXES],
            g10_persist_flag: false,
            feedhold_requested: false,
            queue_flush_requested: false,
            cycle_start_requested: false,
            planner: Planner::new(),
            arc: ArcGenerator::new(),
            runtime: MotionRuntime::new(),
            stepper,
            reports: Reports::new(),
            clock: Duration::ZERO,
        }
    }

    /// Elapsed machine time.
    #[inline]
    pub fn clock(&self) -> Duration {
        self.clock
    }

    /// Advance the machine by at most one segment. Returns `true` when a
    /// segment (line or dwell) was executed; `false` when the machine is
    /// idle or holding.
    pub fn pump(&mut self, driver: &mut dyn StepDriver) -> Result<bool, Status> {
        self.feedhold_sequencing_callback();

        if self.arc.is_active() {
            let path_control = self.gm.path_control;
            self.arc.fill(&mut self.planner, &self.config, path_control)?;
        }

        // Exec phase: stage the next segment, dispatching any command
        // blocks that reach execution on the way.
        while self.stepper.prep_available() {
            match exec_move(
                &mut self.planner,
                &mut self.runtime,
                &mut self.states,
                &self.config,
                &mut self.stepper,
            )? {
                ExecSignal::Command(command) => {
                    self.apply_command(command, driver);
                }
                ExecSignal::Prepped => break,
                ExecSignal::Noop => break,
            }
        }

        // Load and run phase.
        if !self.stepper.is_busy() && self.stepper.prep_staged() {
            if self.stepper.load_move(driver, self.clock) {
                let seconds = self.stepper.run_segment(driver);
                self.clock += Duration::from_secs_f64(seconds);
                self.stepper.power_callback(driver, self.clock);
                return Ok(true);
            }
        }

        // Idle: wind a completed cycle down.
        if !self.runtime.is_busy()
            && !self.planner.is_busy()
            && !self.arc.is_active()
            && self.states.motion == MotionState::Run
        {
            debug!("cycle complete");
            self.cycle_end();
        }
        self.stepper.power_callback(driver, self.clock);
        Ok(false)
    }

    /// Pump until the machine goes idle (or reaches a hold).
    pub fn run_to_idle(&mut self, driver: &mut dyn StepDriver) -> Result<(), Status> {
        while self.pump(driver)? {}
        Ok(())
    }

    /// Dispatch a command block in runtime order.
    fn apply_command(&mut self, command: Command, driver: &mut dyn StepDriver) {
        match command {
            Command::SetWorkOffsets => {
                let mut offsets = [0.0; AXES];
                for axis in Axis::ALL {
                    let i = axis.index();
                    offsets[i] = self.config.offset(self.gm.coord_system, axis)
                        + if self.gm.origin_offset_enable {
                            self.gm.origin_offset[i]
                        } else {
                            0.0
                        };
                }
                self.runtime.work_offset = offsets;
            }
            Command::ChangeTool { tool } | Command::SelectTool { tool } => {
                self.gm.tool = tool;
            }
            Command::MistCoolant { on } => {
                self.gm.mist_coolant = on;
            }
            Command::FloodCoolant { on } => {
                self.gm.flood_coolant = on;
                if !on {
                    // M9 drops both coolants.
                    self.gm.mist_coolant = false;
                }
            }
            Command::SpindleControl { mode } => {
                self.gm.spindle_mode = mode;
                driver.set_spindle_duty(spindle_duty(
                    mode,
                    self.gm.spindle_speed,
                    &self.config.machine.spindle,
                ));
            }
            Command::SpindleSpeed { rpm } => {
                self.gm.spindle_speed = rpm;
                if self.gm.spindle_mode != SpindleMode::Off {
                    driver.set_spindle_duty(spindle_duty(
                        self.gm.spindle_mode,
                        rpm,
                        &self.config.machine.spindle,
                    ));
                }
            }
            Command::ProgramFinalize { state } => {
                self.program_finalize(state);
            }
        }
    }

    /// Shared epilogue of program stop, program end and cycle end.
    pub(crate) fn program_finalize(&mut self, state: MachineState) {
        self.states.machine = state;
        self.states.motion = MotionState::Stop;
        self.states.cycle = CycleState::Off;
        self.states.hold = HoldState::Off;
        self.cycle_start_requested = false;
        self.runtime.zero_segment_velocity();
        self.stepper.motion_stopped(self.clock);
        self.reports.request_status();
    }

    /// Fatal condition: kill motor power and the spindle, report, and
    /// reject further motion until the alarm is cleared.
    pub fn alarm(&mut self, driver: &mut dyn StepDriver, status: Status, context: &str) {
        self.stepper.deenergize_motors(driver);
        driver.set_spindle_duty(self.config.machine.spindle.phase_off);
        self.gm.spindle_mode = SpindleMode::Off;
        self.reports.exception(status, context);
        self.states.machine = MachineState::Alarm;
    }

    /// Build a status-report snapshot from the runtime state.
    pub fn status_report(&self) -> StatusReport {
        let runtime_position = self.runtime.position();
        let mut position = [0.0; AXES];
        for axis in Axis::ALL {
            let i = axis.index();
            let work = runtime_position[i] - self.runtime.work_offset[i];
            position[i] = if axis.is_rotary() {
                work
            } else {
                from_millimeters(work, self.gm.units)
            };
        }
        StatusReport {
            machine_state: self.states.machine,
            cycle_state: self.states.cycle,
            motion_state: self.states.motion,
            hold_state: self.states.hold,
            combined_state: combined_state(
                self.states.machine,
                self.states.cycle,
                self.states.motion,
            ),
            position,
            velocity: self.runtime.velocity(),
            units: self.gm.units,
            coord_system: self.gm.coord_system,
            feed_rate: self.gm.feed_rate,
        }
    }

    /// Queue-report snapshot.
    pub fn queue_report(&self) -> crate::report::QueueReport {
        crate::report::QueueReport {
            buffers_available: self.planner.ring.available(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
