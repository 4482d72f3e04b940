//! Canonical machining operations.
//!
//! One method per NIST RS274/NGC canonical function, operating on the
//! owned [`Machine`]. Operations that only touch the model take effect
//! immediately and carry forward into subsequent planning; operations
//! whose side effects must land in runtime order (coordinate-offset
//! changes, tool/coolant/spindle, program stop/end) queue a command block
//! and are dispatched when that block reaches execution.

pub mod model;

use std::f64::consts::PI;

use tracing::info;

use helix_common::axis::Axis;
use helix_common::consts::AXES;
use helix_common::gcode::{
    from_millimeters, CoordSystem, DistanceMode, MotionMode, PathControl, Plane, SpindleMode,
    Units,
};
use helix_common::state::{CycleState, HoldState, MachineState, MotionState};
use helix_common::status::Status;

use crate::machine::Machine;
use crate::plan::buffer::Command;
use crate::plan::fp_zero;

impl Machine {
    /// Reject the operation when the machine is alarmed.
    fn guard_alarm(&self) -> Result<(), Status> {
        if self.states.machine == MachineState::Alarm {
            return Err(Status::Alarm);
        }
        Ok(())
    }

    /// Flush any in-progress arc into the planner before queueing more
    /// work, so block order matches program order. When the ring cannot
    /// take the remaining chords the caller gets `BufferFull` and must
    /// pump before retrying — the hosted equivalent of main blocking on
    /// planner capacity.
    fn drain_arc(&mut self) -> Result<(), Status> {
        if self.arc.is_active() {
            let path_control = self.gm.path_control;
            let done = self
                .arc
                .fill(&mut self.planner, &self.config, path_control)?;
            if !done {
                return Err(Status::BufferFull);
            }
        }
        Ok(())
    }

    // ─── Representation (4.3.3) ─────────────────────────────────────

    /// G17/G18/G19.
    pub fn select_plane(&mut self, plane: Plane) -> Result<(), Status> {
        self.gm.plane = plane;
        Ok(())
    }

    /// G20/G21.
    pub fn set_units_mode(&mut self, units: Units) -> Result<(), Status> {
        self.gm.units = units;
        Ok(())
    }

    /// G90/G91.
    pub fn set_distance_mode(&mut self, mode: DistanceMode) -> Result<(), Status> {
        self.gm.distance_mode = mode;
        Ok(())
    }

    /// G61/G61.1/G64.
    pub fn set_path_control(&mut self, mode: PathControl) -> Result<(), Status> {
        self.gm.path_control = mode;
        Ok(())
    }

    /// G54..G59. The runtime work offsets update when the queued command
    /// reaches execution, so already-planned moves keep their frame.
    pub fn set_coord_system(&mut self, coord: CoordSystem) -> Result<(), Status> {
        self.drain_arc()?;
        self.gm.coord_system = coord;
        self.planner.queue_command(Command::SetWorkOffsets)
    }

    /// G10 L2: set the offsets of a work coordinate system.
    ///
    /// G53 is not settable. Offsets land in the in-memory configuration;
    /// the raised persist flag tells the config collaborator to write NVM
    /// once motion stops.
    pub fn set_coord_offsets(
        &mut self,
        coord: CoordSystem,
        offsets: &[Option<f64>; AXES],
    ) -> Result<(), Status> {
        let Some(row) = coord.work_index() else {
            return Err(Status::InputValueRange);
        };
        for i in 0..AXES {
            if let Some(value) = offsets[i] {
                self.config.machine.offsets[row][i] = self.gm.to_mm(value);
                self.g10_persist_flag = true;
            }
        }
        Ok(())
    }

    /// G92: make the current position read as the given values.
    pub fn set_origin_offsets(&mut self, offsets: &[Option<f64>; AXES]) -> Result<(), Status> {
        self.drain_arc()?;
        self.gm.origin_offset_enable = true;
        for axis in Axis::ALL {
            let i = axis.index();
            if let Some(value) = offsets[i] {
                self.gm.origin_offset[i] = self.gm.position[i]
                    - self.config.offset(self.gm.coord_system, axis)
                    - self.gm.to_mm(value);
            }
        }
        self.planner.queue_command(Command::SetWorkOffsets)
    }

    /// G92.1: zero and disable the origin offsets.
    pub fn reset_origin_offsets(&mut self) -> Result<(), Status> {
        self.drain_arc()?;
        self.gm.origin_offset_enable = false;
        self.gm.origin_offset = [0.0; AXES];
        self.planner.queue_command(Command::SetWorkOffsets)
    }

    /// G92.2: disable the origin offsets without clearing them.
    pub fn suspend_origin_offsets(&mut self) -> Result<(), Status> {
        self.drain_arc()?;
        self.gm.origin_offset_enable = false;
        self.planner.queue_command(Command::SetWorkOffsets)
    }

    /// G92.3: re-enable the stored origin offsets.
    pub fn resume_origin_offsets(&mut self) -> Result<(), Status> {
        self.drain_arc()?;
        self.gm.origin_offset_enable = true;
        self.planner.queue_command(Command::SetWorkOffsets)
    }

    /// Set the canonical position of one axis everywhere: model, planner
    /// and runtime (homing and G28.3 use this).
    pub fn set_machine_axis_position(&mut self, axis: Axis, position: f64) -> Result<(), Status> {
        let i = axis.index();
        self.gm.position[i] = position;
        self.gm.target[i] = position;
        self.planner.set_axis_position(i, position);
        self.runtime.set_axis_position(i, position);
        Ok(())
    }

    /// G28.3: declare the flagged axes to be at the given work positions
    /// and mark them homed.
    pub fn set_absolute_origin(&mut self, origins: &[Option<f64>; AXES]) -> Result<(), Status> {
        for axis in Axis::ALL {
            let i = axis.index();
            if let Some(value) = origins[i] {
                let position =
                    self.config.offset(self.gm.coord_system, axis) + self.gm.to_mm(value);
                self.set_machine_axis_position(axis, position)?;
                self.homed[i] = true;
            }
        }
        Ok(())
    }

    // ─── Free space motion (4.3.4) ──────────────────────────────────

    /// G0: rapid to the resolved target.
    ///
    /// No feed-rate validation (NIST); the per-axis `velocity_max` limits
    /// apply through the move-time computation.
    pub fn straight_traverse(&mut self, words: &[Option<f64>; AXES]) -> Result<(), Status> {
        self.guard_alarm()?;
        self.drain_arc()?;
        // Check capacity before touching the model, so a rejected call can
        // be retried verbatim even in incremental mode.
        if self.planner.ring.available() == 0 {
            return Err(Status::BufferFull);
        }
        self.gm.motion_mode = MotionMode::StraightTraverse;
        self.gm.set_target(&self.config, words)?;
        if self.gm.target_is_position() {
            return Ok(());
        }
        self.cycle_start();
        let (minutes, min_time) = self.gm.move_times(&self.config);
        let work_offset = self.gm.coord_offset_vector(&self.config);
        let result = self.planner.queue_line(
            self.gm.target,
            minutes,
            work_offset,
            min_time,
            &self.config,
            self.gm.path_control,
        );
        self.gm.finalize_move(&result);
        result
    }

    /// G28.1: remember the current position as the G28 park point.
    pub fn set_g28_position(&mut self) -> Result<(), Status> {
        self.gm.g28_position = self.gm.position;
        Ok(())
    }

    /// G28: traverse through the intermediate point to the park point.
    pub fn goto_g28_position(&mut self, words: &[Option<f64>; AXES]) -> Result<(), Status> {
        let park = self.gm.g28_position;
        self.goto_park_position(words, park)
    }

    /// G30.1: remember the current position as the G30 park point.
    pub fn set_g30_position(&mut self) -> Result<(), Status> {
        self.gm.g30_position = self.gm.position;
        Ok(())
    }

    /// G30: traverse through the intermediate point to the G30 park point.
    pub fn goto_g30_position(&mut self, words: &[Option<f64>; AXES]) -> Result<(), Status> {
        let park = self.gm.g30_position;
        self.goto_park_position(words, park)
    }

    fn goto_park_position(
        &mut self,
        words: &[Option<f64>; AXES],
        park: [f64; AXES],
    ) -> Result<(), Status> {
        self.guard_alarm()?;
        self.drain_arc()?;
        // Two traverses are queued back to back; demand the capacity up
        // front instead of spinning on a full ring.
        if self.planner.ring.available() < 2 {
            return Err(Status::BufferFull);
        }
        self.gm.absolute_override = true;
        if let Err(status) = self.straight_traverse(words) {
            self.gm.absolute_override = false;
            return Err(status);
        }
        // Park points are canonical; feed them back through the word
        // interface in external units.
        let mut park_words = [None; AXES];
        for axis in Axis::ALL {
            let i = axis.index();
            park_words[i] = Some(if axis.is_rotary() {
                park[i]
            } else {
                from_millimeters(park[i], self.gm.units)
            });
        }
        let result = self.straight_traverse(&park_words);
        self.gm.absolute_override = false;
        result
    }

    // ─── Machining attributes (4.3.5) ───────────────────────────────

    /// F word: feed rate, or the move time when G93 is active.
    pub fn set_feed_rate(&mut self, feed_rate: f64) -> Result<(), Status> {
        if self.gm.inverse_feed_rate_mode {
            self.gm.inverse_feed_rate = feed_rate;
        } else {
            self.gm.feed_rate = self.gm.to_mm(feed_rate);
        }
        Ok(())
    }

    /// G93/G94.
    pub fn set_inverse_feed_rate_mode(&mut self, mode: bool) -> Result<(), Status> {
        self.gm.inverse_feed_rate_mode = mode;
        Ok(())
    }

    // ─── Machining functions (4.3.6) ────────────────────────────────

    /// G4: dwell for the given seconds.
    pub fn dwell(&mut self, seconds: f64) -> Result<(), Status> {
        self.guard_alarm()?;
        self.drain_arc()?;
        self.cycle_start();
        self.planner.queue_dwell(seconds)
    }

    /// G1: straight feed to the resolved target.
    pub fn straight_feed(&mut self, words: &[Option<f64>; AXES]) -> Result<(), Status> {
        self.guard_alarm()?;
        self.drain_arc()?;
        // Capacity check precedes model mutation; see straight_traverse.
        if self.planner.ring.available() == 0 {
            return Err(Status::BufferFull);
        }
        self.gm.motion_mode = MotionMode::StraightFeed;
        if !self.gm.inverse_feed_rate_mode && fp_zero(self.gm.feed_rate) {
            return Err(Status::FeedRate);
        }
        self.gm.set_target(&self.config, words)?;
        if self.gm.target_is_position() {
            return Ok(());
        }
        self.cycle_start();
        let (minutes, min_time) = self.gm.move_times(&self.config);
        let work_offset = self.gm.coord_offset_vector(&self.config);
        let result = self.planner.queue_line(
            self.gm.target,
            minutes,
            work_offset,
            min_time,
            &self.config,
            self.gm.path_control,
        );
        self.gm.finalize_move(&result);
        result
    }

    /// G2/G3: arc feed in the selected plane, helical across the normal
    /// axis. Center-offset (IJK) and radius (R) formats are supported.
    pub fn arc_feed(
        &mut self,
        words: &[Option<f64>; AXES],
        offsets: [Option<f64>; 3],
        radius: Option<f64>,
        clockwise: bool,
    ) -> Result<(), Status> {
        self.guard_alarm()?;
        self.drain_arc()?;
        self.gm.motion_mode = if clockwise {
            MotionMode::CwArc
        } else {
            MotionMode::CcwArc
        };
        if !self.gm.inverse_feed_rate_mode && fp_zero(self.gm.feed_rate) {
            return Err(Status::FeedRate);
        }
        if radius.is_none() && offsets.iter().all(Option::is_none) {
            return Err(Status::ArcSpecification);
        }

        for (i, offset) in offsets.iter().enumerate() {
            self.gm.arc_offset[i] = self.gm.to_mm(offset.unwrap_or(0.0));
        }
        self.gm.arc_radius = self.gm.to_mm(radius.unwrap_or(0.0));
        self.gm.set_target(&self.config, words)?;

        let (axis_0, axis_1, axis_linear) = self.gm.plane.axes();
        let pos_p = self.gm.position[axis_0.index()];
        let pos_q = self.gm.position[axis_1.index()];
        let tgt_p = self.gm.target[axis_0.index()];
        let tgt_q = self.gm.target[axis_1.index()];

        // Resolve the center as offsets from the start point.
        let (offset_p, offset_q) = if radius.is_some() {
            radius_format_offsets(self.gm.arc_radius, tgt_p - pos_p, tgt_q - pos_q, clockwise)?
        } else {
            (
                self.gm.arc_offset[axis_0.index()],
                self.gm.arc_offset[axis_1.index()],
            )
        };

        let arc_radius = offset_p.hypot(offset_q);
        if fp_zero(arc_radius) {
            return Err(Status::ArcSpecification);
        }
        let center_p = pos_p + offset_p;
        let center_q = pos_q + offset_q;
        let theta_start = (pos_q - center_q).atan2(pos_p - center_p);
        let theta_end = (tgt_q - center_q).atan2(tgt_p - center_p);

        let mut angular_travel = theta_end - theta_start;
        if clockwise {
            // A coincident endpoint means a full circle.
            if angular_travel >= -crate::plan::EPSILON {
                angular_travel -= 2.0 * PI;
            }
        } else if angular_travel <= crate::plan::EPSILON {
            angular_travel += 2.0 * PI;
        }

        let linear_travel =
            self.gm.target[axis_linear.index()] - self.gm.position[axis_linear.index()];
        let length = (angular_travel * arc_radius).hypot(linear_travel);

        // Arc time: requested feed (or G93 time), stretched by the slower
        // of the participating axes.
        let feed_time = if self.gm.inverse_feed_rate_mode {
            self.gm.inverse_feed_rate
        } else {
            length / self.gm.feed_rate
        };
        let mut rate_limit = self.config.axis(axis_0).feedrate_max;
        rate_limit = rate_limit.min(self.config.axis(axis_1).feedrate_max);
        if !fp_zero(linear_travel) {
            rate_limit = rate_limit.min(self.config.axis(axis_linear).feedrate_max);
        }
        let minutes = feed_time.max(length / rate_limit);
        let min_time = length / rate_limit;

        let work_offset = self.gm.coord_offset_vector(&self.config);
        self.arc.begin(
            self.gm.position,
            self.gm.target,
            theta_start,
            arc_radius,
            angular_travel,
            linear_travel,
            (axis_0, axis_1, axis_linear),
            minutes,
            min_time,
            work_offset,
            self.config.machine.planner.chord_tolerance,
        )?;
        self.cycle_start();
        // The model leads: chords drain into the planner from the pump.
        self.gm.position = self.gm.target;
        Ok(())
    }

    // ─── Spindle and tool (4.3.7, 4.3.8) ────────────────────────────

    /// M3/M4/M5, timed with motion through the command queue.
    pub fn spindle_control(&mut self, mode: SpindleMode) -> Result<(), Status> {
        self.drain_arc()?;
        self.planner.queue_command(Command::SpindleControl { mode })
    }

    /// S word.
    pub fn set_spindle_speed(&mut self, rpm: f64) -> Result<(), Status> {
        self.drain_arc()?;
        self.planner.queue_command(Command::SpindleSpeed { rpm })
    }

    /// T word.
    pub fn select_tool(&mut self, tool: u8) -> Result<(), Status> {
        self.drain_arc()?;
        self.planner.queue_command(Command::SelectTool { tool })
    }

    /// M6.
    pub fn change_tool(&mut self, tool: u8) -> Result<(), Status> {
        self.drain_arc()?;
        self.planner.queue_command(Command::ChangeTool { tool })
    }

    // ─── Coolant and overrides (4.3.9) ──────────────────────────────

    /// M7.
    pub fn mist_coolant_control(&mut self, on: bool) -> Result<(), Status> {
        self.drain_arc()?;
        self.planner.queue_command(Command::MistCoolant { on })
    }

    /// M8/M9. M9 also drops mist coolant at execution time.
    pub fn flood_coolant_control(&mut self, on: bool) -> Result<(), Status> {
        self.drain_arc()?;
        self.planner.queue_command(Command::FloodCoolant { on })
    }

    /// M48/M49: master override enable.
    pub fn override_enables(&mut self, enable: bool) -> Result<(), Status> {
        self.gm.feed_override_enable = enable;
        self.gm.traverse_override_enable = enable;
        self.gm.spindle_override_enable = enable;
        Ok(())
    }

    /// M50.
    pub fn feed_rate_override_factor(&mut self, factor: f64) -> Result<(), Status> {
        self.gm.feed_override_enable = !fp_zero(factor);
        self.gm.feed_override_factor = factor;
        Ok(())
    }

    /// M50.2.
    pub fn traverse_override_factor(&mut self, factor: f64) -> Result<(), Status> {
        self.gm.traverse_override_enable = !fp_zero(factor);
        self.gm.traverse_override_factor = factor;
        Ok(())
    }

    /// M51.
    pub fn spindle_override_factor(&mut self, factor: f64) -> Result<(), Status> {
        self.gm.spindle_override_enable = !fp_zero(factor);
        self.gm.spindle_override_factor = factor;
        Ok(())
    }

    // ─── Program functions (4.3.10) ─────────────────────────────────

    /// Enter (or continue) a machining cycle.
    pub fn cycle_start(&mut self) {
        self.states.machine = MachineState::Cycle;
        if self.states.cycle == CycleState::Off {
            self.states.cycle = CycleState::Started;
        }
    }

    /// Wind a finished cycle down to program-stop state.
    pub fn cycle_end(&mut self) {
        if self.states.cycle == CycleState::Started {
            self.program_finalize(MachineState::ProgramStop);
        }
    }

    /// M0/M60: stop at this point in the queue.
    pub fn program_stop(&mut self) -> Result<(), Status> {
        self.drain_arc()?;
        self.planner.queue_command(Command::ProgramFinalize {
            state: MachineState::ProgramStop,
        })
    }

    /// M1: optional stop (always honored here; the stop switch lives in
    /// the block parser).
    pub fn optional_program_stop(&mut self) -> Result<(), Status> {
        self.program_stop()
    }

    /// M2/M30: reset the model per NIST 3.6.1 and queue the finalize.
    pub fn program_end(&mut self) -> Result<(), Status> {
        info!("program end");
        self.reset_origin_offsets()?;
        self.set_coord_system(self.config.machine.defaults.coord_system)?;
        self.select_plane(self.config.machine.defaults.plane)?;
        self.set_distance_mode(self.config.machine.defaults.distance_mode)?;
        self.set_units_mode(self.config.machine.defaults.units)?;
        self.spindle_control(SpindleMode::Off)?;
        self.flood_coolant_control(false)?;
        self.set_inverse_feed_rate_mode(false)?;
        self.gm.motion_mode = MotionMode::Cancel;
        self.planner.queue_command(Command::ProgramFinalize {
            state: MachineState::ProgramEnd,
        })
    }

    // ─── Feedhold, queue flush, cycle start ─────────────────────────

    /// Ask for a feedhold at the next segment boundary.
    pub fn request_feedhold(&mut self) {
        self.feedhold_requested = true;
    }

    /// Ask for the planner queue to be discarded once holding/stopped.
    pub fn request_queue_flush(&mut self) {
        self.queue_flush_requested = true;
    }

    /// Ask for a cycle (re)start.
    pub fn request_cycle_start(&mut self) {
        self.cycle_start_requested = true;
    }

    /// Periodic arbitration of the three request flags.
    ///
    /// - Feedhold is honored only while running and not already holding;
    ///   otherwise the request is dropped.
    /// - Queue flush is honored only once motion is stopped or the hold
    ///   has reached zero velocity; until then it stays pending.
    /// - Cycle start is deferred while a queue flush is pending; honoring
    ///   it ends any hold and resumes the queue.
    pub fn feedhold_sequencing_callback(&mut self) {
        if self.feedhold_requested {
            if self.states.motion == MotionState::Run && self.states.hold == HoldState::Off {
                self.states.motion = MotionState::Hold;
                self.states.hold = HoldState::Sync;
            }
            self.feedhold_requested = false;
        }
        if self.queue_flush_requested
            && (self.states.motion == MotionState::Stop
                || (self.states.motion == MotionState::Hold
                    && self.states.hold == HoldState::Hold))
        {
            self.queue_flush_requested = false;
            self.flush_planner();
        }
        if self.cycle_start_requested && !self.queue_flush_requested {
            self.cycle_start_requested = false;
            self.states.hold = HoldState::EndHold;
            self.cycle_start();
            self.end_hold();
        }
    }

    /// Resume from a hold (or plain cycle start when nothing is held).
    fn end_hold(&mut self) {
        if self.states.hold != HoldState::EndHold {
            return;
        }
        self.states.hold = HoldState::Off;
        if self.planner.is_busy() || self.runtime.is_busy() {
            self.states.motion = MotionState::Run;
        } else {
            self.states.motion = MotionState::Stop;
        }
    }

    /// Drop everything queued and re-sync the model and planner to the
    /// runtime's actual position.
    pub fn flush_planner(&mut self) {
        self.arc.abort();
        self.planner.flush();
        self.runtime.reset();
        let position = self.runtime.position();
        for i in 0..AXES {
            self.planner.set_axis_position(i, position[i]);
        }
        self.gm.position = position;
        self.gm.target = position;
        self.reports.request_queue();
    }
}

// ─── Arc radius format ──────────────────────────────────────────────

/// Compute center offsets from an R-word arc.
///
/// Of the two circles through the start and end points, positive R picks
/// the minor arc, negative R the major one. A coincident endpoint has no
/// solution in radius format.
fn radius_format_offsets(
    radius: f64,
    x: f64,
    y: f64,
    clockwise: bool,
) -> Result<(f64, f64), Status> {
    if fp_zero(x) && fp_zero(y) {
        return Err(Status::ArcSpecification);
    }
    let r = radius.abs();
    let d2 = x * x + y * y;
    let h2 = 4.0 * r * r - d2;
    if h2 < 0.0 {
        return Err(Status::ArcSpecification);
    }
    let mut h_x2_div_d = -h2.sqrt() / d2.sqrt();
    if !clockwise {
        h_x2_div_d = -h_x2_div_d;
    }
    if radius < 0.0 {
        h_x2_div_d = -h_x2_div_d;
    }
    Ok((0.5 * (x - y * h_x2_div_d), 0.5 * (y + x * h_x2_div_d)))
}

// ─── Tests ──────────────────────────────────────────────────────────
