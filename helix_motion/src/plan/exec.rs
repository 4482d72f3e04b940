//! Motion runtime: slices the running block into DDA-ready segments.
//!
//! Exec is the low-priority half of the stepper staging chain. Each call
//! advances the running block's profile by one segment (~5 ms), writes the
//! per-motor step displacement into the segment sink (the stepper prep
//! buffer), and hands command blocks back to the caller for dispatch in
//! runtime order.
//!
//! Feedhold: when the hold state is `Sync` the runtime re-carves the
//! in-flight move into a deceleration tail along its own jerk profile. If
//! the braking distance fits in the running block, the block's remainder is
//! handed back to the planner as a fresh zero-entry block (the resume
//! point); otherwise the deceleration continues across block boundaries
//! (`DecelContinue`) until the velocity reaches zero.

use tracing::trace;

use helix_common::consts::{
    AXES, MICROSECONDS_PER_MINUTE, MIN_LINE_LENGTH, MIN_SEGMENT_TIME, MOTORS, NOM_SEGMENT_TIME,
};
use helix_common::state::{HoldState, MotionState};
use helix_common::status::Status;

use crate::config::LoadedConfig;
use crate::machine::States;
use crate::stepper::SegmentSink;

use super::axis_vector_length;
use super::buffer::{Block, BlockState, Command, Payload};
use super::fp_zero;
use super::line::Planner;
use super::zoid::{target_length, target_velocity};

/// Outcome of one exec call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecSignal {
    /// Nothing to execute (planner empty, or holding).
    Noop,
    /// A segment was staged in the sink.
    Prepped,
    /// A command block reached execution; the caller dispatches it.
    Command(Command),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RunState {
    #[default]
    Off,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Section {
    #[default]
    Head,
    Body,
    Tail,
}

/// Persistent runtime state for the move being executed.
#[derive(Debug, Default)]
pub struct MotionRuntime {
    state: RunState,
    section: Section,
    section_new: bool,

    /// Current machine position [mm].
    position: [f64; AXES],
    /// Endpoint of the in-flight profile [mm].
    endpoint: [f64; AXES],
    unit: [f64; AXES],
    /// Work offset of the running block, for reporting.
    pub work_offset: [f64; AXES],

    head_length: f64,
    body_length: f64,
    tail_length: f64,
    entry_velocity: f64,
    cruise_velocity: f64,
    exit_velocity: f64,
    recip_jerk: f64,
    cbrt_jerk: f64,

    // Current section progress.
    section_length: f64,
    section_vi: f64,
    section_vt: f64,
    section_time: f64,
    section_distance: f64,
    segment_count: u32,
    /// Time per segment [min].
    segment_time: f64,
    elapsed: f64,

    /// Velocity of the last emitted segment [mm/min].
    segment_velocity: f64,

    /// Deceleration landed short of the block end; the trimmed remainder
    /// was handed back to the planner and must not be freed on completion.
    hold_trim: bool,
}

impl MotionRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current machine position [mm].
    #[inline]
    pub fn position(&self) -> [f64; AXES] {
        self.position
    }

    /// Velocity of the last emitted segment [mm/min].
    #[inline]
    pub fn velocity(&self) -> f64 {
        self.segment_velocity
    }

    /// True while a block profile is in flight.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.state == RunState::Run
    }

    /// Overwrite one axis of the runtime position (homing, G28.3).
    pub fn set_axis_position(&mut self, axis: usize, position: f64) {
        self.position[axis] = position;
    }

    /// Zero the reported velocity (program stop/end).
    pub fn zero_segment_velocity(&mut self) {
        self.segment_velocity = 0.0;
    }

    /// Abandon any in-flight profile, keeping the position (queue flush).
    pub fn reset(&mut self) {
        let position = self.position;
        *self = Self {
            position,
            ..Self::default()
        };
    }

    /// Load the runtime from a freshly claimed block.
    fn init_from_block(&mut self, block: &Block) {
        self.state = RunState::Run;
        self.section = Section::Head;
        self.section_new = true;
        self.endpoint = block.target;
        self.unit = block.unit;
        self.work_offset = block.work_offset;
        self.head_length = block.head_length;
        self.body_length = block.body_length;
        self.tail_length = block.tail_length;
        self.entry_velocity = block.entry_velocity;
        self.cruise_velocity = block.cruise_velocity;
        self.exit_velocity = block.exit_velocity;
        self.recip_jerk = block.recip_jerk;
        self.cbrt_jerk = block.cbrt_jerk;
        self.hold_trim = false;
    }

    /// Initialize the next non-empty section. Returns `false` when the
    /// profile is exhausted (block complete, nothing emitted).
    fn init_section_chain(&mut self) -> bool {
        loop {
            let (vi, vt, length) = match self.section {
                Section::Head => (self.entry_velocity, self.cruise_velocity, self.head_length),
                Section::Body => (self.cruise_velocity, self.cruise_velocity, self.body_length),
                Section::Tail => (self.cruise_velocity, self.exit_velocity, self.tail_length),
            };
            if !fp_zero(length) {
                let time = 2.0 * length / (vi + vt).max(super::EPSILON);
                let mut segments = (time / NOM_SEGMENT_TIME).ceil().max(1.0);
                let mut segment_time = time / segments;
                if segment_time < MIN_SEGMENT_TIME && segments > 1.0 {
                    segments = (time / MIN_SEGMENT_TIME).floor().max(1.0);
                    segment_time = time / segments;
                }
                self.section_length = length;
                self.section_vi = vi;
                self.section_vt = vt;
                self.section_time = time;
                self.section_distance = 0.0;
                self.segment_count = segments as u32;
                self.segment_time = segment_time;
                self.elapsed = 0.0;
                self.section_new = false;
                return true;
            }
            match self.section {
                Section::Head => self.section = Section::Body,
                Section::Body => self.section = Section::Tail,
                Section::Tail => return false,
            }
        }
    }
}

/// Distance covered at time `t` into a constant-jerk ramp from `vi` to
/// `vt` over duration `time`. The velocity is piecewise quadratic: concave
/// to the midpoint, convex after it.
fn ramp_distance(vi: f64, vt: f64, time: f64, t: f64) -> f64 {
    let dv = vt - vi;
    let half = time / 2.0;
    if t <= half {
        vi * t + (2.0 / 3.0) * dv * t * t * t / (time * time)
    } else {
        let u = time - t;
        let total = (vi + vt) * time / 2.0;
        total - (vt * u - (2.0 / 3.0) * dv * u * u * u / (time * time))
    }
}

/// Advance the runtime by one step: claim blocks, dispatch commands, stage
/// one segment, or report that there is nothing to do.
pub fn exec_move(
    planner: &mut Planner,
    mr: &mut MotionRuntime,
    states: &mut States,
    cfg: &LoadedConfig,
    sink: &mut dyn SegmentSink,
) -> Result<ExecSignal, Status> {
    if states.hold == HoldState::Sync {
        plan_hold(planner, mr, states);
    }

    loop {
        if states.hold == HoldState::Hold {
            return Ok(ExecSignal::Noop);
        }

        if mr.state == RunState::Off {
            let Some(run) = planner.ring.first() else {
                if states.hold == HoldState::DecelContinue {
                    // Queue exhausted mid-deceleration; planning guarantees
                    // the chain ends at zero velocity.
                    states.hold = HoldState::Hold;
                    mr.segment_velocity = 0.0;
                }
                return Ok(ExecSignal::Noop);
            };

            if states.hold == HoldState::DecelContinue && !planner.ring.block(run).is_line() {
                // Planning guarantees zero velocity into a command or
                // dwell boundary, so this is the hold point.
                states.hold = HoldState::Hold;
                mr.segment_velocity = 0.0;
                return Ok(ExecSignal::Noop);
            }

            let run = planner.ring.run_block().expect("first() implies a run block");
            match planner.ring.block(run).payload {
                Payload::Command(command) => {
                    planner.ring.free_run();
                    return Ok(ExecSignal::Command(command));
                }
                Payload::Dwell { seconds } => {
                    sink.prep_dwell(seconds * 1_000_000.0)?;
                    planner.ring.free_run();
                    if states.hold == HoldState::Off {
                        states.motion = MotionState::Run;
                    }
                    return Ok(ExecSignal::Prepped);
                }
                Payload::Line => {
                    if states.hold == HoldState::DecelContinue {
                        continue_hold_into_block(planner, mr, states, run);
                    } else {
                        let block = planner.ring.block(run);
                        mr.init_from_block(block);
                        if states.hold == HoldState::Off {
                            states.motion = MotionState::Run;
                        }
                    }
                }
                Payload::Null => {
                    planner.ring.free_run();
                    continue;
                }
            }
        }

        if mr.section_new && !mr.init_section_chain() {
            finalize_block(planner, mr, states);
            continue;
        }

        emit_segment(mr, cfg, sink)?;

        if mr.segment_count == 0 {
            match mr.section {
                Section::Head => {
                    mr.section = Section::Body;
                    mr.section_new = true;
                }
                Section::Body => {
                    mr.section = Section::Tail;
                    mr.section_new = true;
                }
                Section::Tail => finalize_block(planner, mr, states),
            }
        }
        return Ok(ExecSignal::Prepped);
    }
}

/// Stage one segment of the current section into the sink.
fn emit_segment(
    mr: &mut MotionRuntime,
    cfg: &LoadedConfig,
    sink: &mut dyn SegmentSink,
) -> Result<(), Status> {
    mr.segment_count -= 1;
    mr.elapsed += mr.segment_time;

    // The final segment runs to the exact section length, absorbing the
    // quadrature drift of the ramp sampling.
    let along = if mr.segment_count == 0 {
        mr.section_length
    } else {
        ramp_distance(mr.section_vi, mr.section_vt, mr.section_time, mr.elapsed)
    };
    let ds = along - mr.section_distance;
    mr.section_distance = along;

    let mut target = mr.position;
    for i in 0..AXES {
        target[i] += mr.unit[i] * ds;
    }

    let mut steps = [0.0; MOTORS];
    for m in 0..MOTORS {
        let axis = cfg.motor_axis[m];
        if !matches!(
            cfg.axis_mode(axis),
            helix_common::axis::AxisMode::Standard | helix_common::axis::AxisMode::Radius
        ) {
            continue;
        }
        let i = axis.index();
        steps[m] = (target[i] - mr.position[i]) * cfg.steps_per_unit[m];
    }

    sink.prep_line(steps, mr.segment_time * MICROSECONDS_PER_MINUTE)?;
    mr.segment_velocity = ds / mr.segment_time;
    mr.position = target;
    trace!(
        velocity = mr.segment_velocity,
        remaining = mr.segment_count,
        "segment staged"
    );
    Ok(())
}

/// Close out a completed block profile.
fn finalize_block(planner: &mut Planner, mr: &mut MotionRuntime, states: &mut States) {
    mr.position = mr.endpoint;
    mr.state = RunState::Off;
    match states.hold {
        HoldState::Decel => {
            // Deceleration complete; the machine is holding.
            if !mr.hold_trim {
                planner.ring.free_run();
            }
            mr.hold_trim = false;
            mr.segment_velocity = 0.0;
            states.hold = HoldState::Hold;
        }
        _ => {
            planner.ring.free_run();
        }
    }
}

/// Re-carve the in-flight move into a deceleration to zero (hold sync).
fn plan_hold(planner: &mut Planner, mr: &mut MotionRuntime, states: &mut States) {
    if mr.state == RunState::Off {
        if fp_zero(mr.segment_velocity) {
            states.hold = HoldState::Hold;
            mr.segment_velocity = 0.0;
        } else {
            // Between blocks; shed the carried velocity in the next one.
            states.hold = HoldState::DecelContinue;
        }
        return;
    }

    let available = axis_vector_length(&mr.endpoint, &mr.position);
    let braking_velocity = mr.segment_velocity;
    let mut braking_length = target_length(braking_velocity, 0.0, mr.recip_jerk);

    // Perfect-fit guard: if this block was already planned to a stop, the
    // braking always fits what is left of it.
    if braking_length > available && fp_zero(mr.exit_velocity) {
        braking_length = available;
    }

    if braking_length <= available {
        decelerate_within(planner, mr, states, braking_length, available);
    } else {
        // The ramp spans past this block: shed what this block allows and
        // carry the rest into the following blocks.
        mr.section = Section::Tail;
        mr.section_new = true;
        mr.head_length = 0.0;
        mr.body_length = 0.0;
        mr.tail_length = available;
        mr.cruise_velocity = braking_velocity;
        mr.exit_velocity =
            (braking_velocity - target_velocity(0.0, available, mr.cbrt_jerk)).max(0.0);
        states.hold = HoldState::DecelContinue;
    }
}

/// The braking ramp fits in the in-flight block: run a tail to zero and
/// hand the block's remainder back to the planner as the resume point.
fn decelerate_within(
    planner: &mut Planner,
    mr: &mut MotionRuntime,
    states: &mut States,
    braking_length: f64,
    available: f64,
) {
    let remainder = available - braking_length;

    mr.section = Section::Tail;
    mr.section_new = true;
    mr.head_length = 0.0;
    mr.body_length = 0.0;
    mr.cruise_velocity = mr.segment_velocity;
    mr.exit_velocity = 0.0;

    if remainder < MIN_LINE_LENGTH {
        // The stop lands at the block end; absorb the sliver.
        mr.tail_length = available;
        // endpoint unchanged: the hold point is the block target.
    } else {
        mr.tail_length = braking_length;
        let mut stop = mr.position;
        for i in 0..AXES {
            stop[i] += mr.unit[i] * braking_length;
        }
        mr.endpoint = stop;
        mr.hold_trim = true;

        // Re-purpose the running block as the resume move covering the
        // remainder, then re-plan everything behind it from rest.
        if let Some(run) = planner.ring.run_block() {
            let block = planner.ring.block_mut(run);
            let scale = remainder / block.length;
            for steps in &mut block.motor_steps {
                *steps *= scale;
            }
            block.length = remainder;
            block.entry_vmax = 0.0;
            block.delta_vmax = target_velocity(0.0, remainder, block.cbrt_jerk);
            block.braking_velocity = block.delta_vmax;
            block.exit_vmax = block.cruise_vmax.min(block.delta_vmax);
            block.state = BlockState::Pending;
            planner.replan_all();
        }
    }
    states.hold = HoldState::Decel;
}

/// Continue a multi-block deceleration into a freshly claimed line block.
fn continue_hold_into_block(
    planner: &mut Planner,
    mr: &mut MotionRuntime,
    states: &mut States,
    run: usize,
) {
    let block = planner.ring.block(run);
    let carried = mr.segment_velocity;

    mr.state = RunState::Run;
    mr.endpoint = block.target;
    mr.unit = block.unit;
    mr.work_offset = block.work_offset;
    mr.recip_jerk = block.recip_jerk;
    mr.cbrt_jerk = block.cbrt_jerk;
    mr.entry_velocity = carried;
    mr.hold_trim = false;

    let mut braking_length = target_length(carried, 0.0, block.recip_jerk);
    if braking_length > block.length && fp_zero(block.exit_velocity) {
        braking_length = block.length;
    }

    if braking_length <= block.length {
        decelerate_within(planner, mr, states, braking_length, block.length);
    } else {
        mr.section = Section::Tail;
        mr.section_new = true;
        mr.head_length = 0.0;
        mr.body_length = 0.0;
        mr.tail_length = block.length;
        mr.cruise_velocity = carried;
        mr.exit_velocity =
            (carried - target_velocity(0.0, block.length, block.cbrt_jerk)).max(0.0);
        // Hold state stays DecelContinue.
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use helix_common::state::{CycleState, MachineState};

    /// Recording sink standing in for the stepper prep buffer.
    #[derive(Debug, Default)]
    struct MockSink {
        lines: Vec<([f64; MOTORS], f64)>,
        dwells: Vec<f64>,
    }

    impl SegmentSink for MockSink {
        fn prep_line(&mut self, steps: [f64; MOTORS], microseconds: f64) -> Result<(), Status> {
            self.lines.push((steps, microseconds));
            Ok(())
        }

        fn prep_dwell(&mut self, microseconds: f64) -> Result<(), Status> {
            self.dwells.push(microseconds);
            Ok(())
        }

        fn prep_null(&mut self) {}
    }

    fn setup() -> (Planner, MotionRuntime, States, LoadedConfig, MockSink) {
        (
            Planner::new(),
            MotionRuntime::new(),
            States {
                machine: MachineState::Cycle,
                cycle: CycleState::Started,
                motion: MotionState::Stop,
                hold: HoldState::Off,
            },
            LoadedConfig::default(),
            MockSink::default(),
        )
    }

    fn queue(planner: &mut Planner, cfg: &LoadedConfig, target: [f64; AXES], feed: f64) {
        let length = axis_vector_length(&target, &planner.position());
        planner
            .queue_line(
                target,
                length / feed,
                [0.0; AXES],
                length / feed,
                cfg,
                helix_common::gcode::PathControl::Continuous,
            )
            .unwrap();
    }

    fn drain(
        planner: &mut Planner,
        mr: &mut MotionRuntime,
        states: &mut States,
        cfg: &LoadedConfig,
        sink: &mut MockSink,
    ) {
        loop {
            match exec_move(planner, mr, states, cfg, sink).unwrap() {
                ExecSignal::Noop => break,
                ExecSignal::Prepped => continue,
                ExecSignal::Command(_) => continue,
            }
        }
    }

    #[test]
    fn line_segments_conserve_steps() {
        let (mut planner, mut mr, mut states, cfg, mut sink) = setup();
        queue(&mut planner, &cfg, [10.0, 5.0, 0.0, 0.0, 0.0, 0.0], 3000.0);
        drain(&mut planner, &mut mr, &mut states, &cfg, &mut sink);

        let total_x: f64 = sink.lines.iter().map(|(s, _)| s[0]).sum();
        let total_y: f64 = sink.lines.iter().map(|(s, _)| s[1]).sum();
        assert!((total_x - 10.0 * cfg.steps_per_unit[0]).abs() < 1e-6);
        assert!((total_y - 5.0 * cfg.steps_per_unit[1]).abs() < 1e-6);
        assert_eq!(mr.position()[0], 10.0);
        assert_eq!(mr.position()[1], 5.0);
        assert!(!planner.is_busy());
    }

    #[test]
    fn segment_velocity_profile_ramps() {
        let (mut planner, mut mr, mut states, cfg, mut sink) = setup();
        queue(&mut planner, &cfg, [50.0, 0.0, 0.0, 0.0, 0.0, 0.0], 6000.0);

        let mut velocities = Vec::new();
        loop {
            match exec_move(&mut planner, &mut mr, &mut states, &cfg, &mut sink).unwrap() {
                ExecSignal::Prepped => velocities.push(mr.velocity()),
                _ => break,
            }
        }
        assert!(velocities.len() >= 3);
        let peak = velocities.iter().cloned().fold(0.0, f64::max);
        assert!(peak <= 6000.0 * 1.01, "peak {peak} above cruise");
        // Starts and ends well below the peak.
        assert!(velocities[0] < peak);
        assert!(*velocities.last().unwrap() < peak);
    }

    #[test]
    fn segment_times_stay_within_bounds() {
        let (mut planner, mut mr, mut states, cfg, mut sink) = setup();
        queue(&mut planner, &cfg, [30.0, 0.0, 0.0, 0.0, 0.0, 0.0], 4000.0);
        drain(&mut planner, &mut mr, &mut states, &cfg, &mut sink);

        for (_, us) in &sink.lines {
            let minutes = us / MICROSECONDS_PER_MINUTE;
            assert!(minutes <= NOM_SEGMENT_TIME * 1.5, "segment too long");
            assert!(minutes >= MIN_SEGMENT_TIME * 0.5, "segment too short");
        }
    }

    #[test]
    fn command_blocks_surface_in_order() {
        let (mut planner, mut mr, mut states, cfg, mut sink) = setup();
        queue(&mut planner, &cfg, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0);
        planner
            .queue_command(Command::SelectTool { tool: 7 })
            .unwrap();

        let mut seen_command = false;
        let mut segments_before_command = 0;
        loop {
            match exec_move(&mut planner, &mut mr, &mut states, &cfg, &mut sink).unwrap() {
                ExecSignal::Prepped => {
                    assert!(!seen_command, "segment after the command");
                    segments_before_command += 1;
                }
                ExecSignal::Command(Command::SelectTool { tool }) => {
                    assert_eq!(tool, 7);
                    seen_command = true;
                }
                ExecSignal::Command(_) => unreachable!(),
                ExecSignal::Noop => break,
            }
        }
        assert!(seen_command);
        assert!(segments_before_command > 0);
    }

    #[test]
    fn dwell_preps_with_converted_time() {
        let (mut planner, mut mr, mut states, cfg, mut sink) = setup();
        planner.queue_dwell(0.25).unwrap();
        drain(&mut planner, &mut mr, &mut states, &cfg, &mut sink);
        assert_eq!(sink.dwells, vec![250_000.0]);
    }

    #[test]
    fn inhibited_axis_emits_no_steps() {
        let (mut planner, mut mr, mut states, mut cfg, mut sink) = setup();
        cfg.machine.axes[1].mode = helix_common::axis::AxisMode::Inhibited;
        queue(&mut planner, &cfg, [10.0, 10.0, 0.0, 0.0, 0.0, 0.0], 3000.0);
        drain(&mut planner, &mut mr, &mut states, &cfg, &mut sink);

        let total_y: f64 = sink.lines.iter().map(|(s, _)| s[1]).sum();
        assert_eq!(total_y, 0.0);
        // The target still resolves: runtime position reflects Y motion.
        assert_eq!(mr.position()[1], 10.0);
    }

    #[test]
    fn feedhold_decelerates_to_zero_and_holds() {
        let (mut planner, mut mr, mut states, cfg, mut sink) = setup();
        queue(&mut planner, &cfg, [100.0, 0.0, 0.0, 0.0, 0.0, 0.0], 6000.0);

        // Run deep into the acceleration ramp.
        for _ in 0..20 {
            let signal =
                exec_move(&mut planner, &mut mr, &mut states, &cfg, &mut sink).unwrap();
            assert_eq!(signal, ExecSignal::Prepped);
        }
        let held_velocity = mr.velocity();
        assert!(held_velocity > 2000.0, "velocity {held_velocity} too low");

        // Request the hold and run to standstill.
        states.motion = MotionState::Hold;
        states.hold = HoldState::Sync;
        let mut velocities = Vec::new();
        loop {
            match exec_move(&mut planner, &mut mr, &mut states, &cfg, &mut sink).unwrap() {
                ExecSignal::Prepped => velocities.push(mr.velocity()),
                ExecSignal::Noop => break,
                ExecSignal::Command(_) => unreachable!(),
            }
        }
        assert_eq!(states.hold, HoldState::Hold);
        assert_eq!(mr.velocity(), 0.0);
        assert!(
            velocities.windows(2).all(|w| w[1] <= w[0] + 1e-6),
            "deceleration not monotonic: {velocities:?}"
        );
        // The hold point is short of the endpoint and the remainder is
        // queued for resume.
        assert!(mr.position()[0] < 100.0);
        assert!(planner.is_busy());
    }

    #[test]
    fn feedhold_resume_completes_the_move() {
        let (mut planner, mut mr, mut states, cfg, mut sink) = setup();
        queue(&mut planner, &cfg, [100.0, 0.0, 0.0, 0.0, 0.0, 0.0], 6000.0);

        for _ in 0..6 {
            exec_move(&mut planner, &mut mr, &mut states, &cfg, &mut sink).unwrap();
        }
        states.motion = MotionState::Hold;
        states.hold = HoldState::Sync;
        drain(&mut planner, &mut mr, &mut states, &cfg, &mut sink);
        assert_eq!(states.hold, HoldState::Hold);

        // Cycle start: end the hold and run the queue dry.
        states.hold = HoldState::Off;
        states.motion = MotionState::Run;
        drain(&mut planner, &mut mr, &mut states, &cfg, &mut sink);
        assert_eq!(mr.position()[0], 100.0);
        assert!(!planner.is_busy());

        // No pulses were lost across the hold: the staged steps sum to the
        // whole move.
        let total_x: f64 = sink.lines.iter().map(|(s, _)| s[0]).sum();
        assert!((total_x - 100.0 * cfg.steps_per_unit[0]).abs() < 1e-6);
    }

    #[test]
    fn feedhold_between_blocks_holds_immediately() {
        let (mut planner, mut mr, mut states, cfg, mut sink) = setup();
        queue(&mut planner, &cfg, [5.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0);
        drain(&mut planner, &mut mr, &mut states, &cfg, &mut sink);
        mr.zero_segment_velocity();

        states.motion = MotionState::Hold;
        states.hold = HoldState::Sync;
        let signal = exec_move(&mut planner, &mut mr, &mut states, &cfg, &mut sink).unwrap();
        assert_eq!(signal, ExecSignal::Noop);
        assert_eq!(states.hold, HoldState::Hold);
    }
}
