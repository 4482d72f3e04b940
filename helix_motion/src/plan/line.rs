//! Line queueing and continuous back-planning.
//!
//! `queue_line` derives the block parameters (length, unit vector, jerk
//! terms, velocity caps) and appends to the ring; `plan_block_list` then
//! walks backwards from the newest block accumulating braking velocity and
//! forwards again negotiating entry/exit velocities and recomputing each
//! trapezoid. Planning converges to a stable prefix: blocks whose exit is
//! pinned by a cap stop being replannable and bound later passes.

use helix_common::axis::AxisMode;
use helix_common::consts::{AXES, JERK_MATCH_PRECISION, MIN_LINE_LENGTH, MOTORS};
use helix_common::gcode::PathControl;
use helix_common::status::Status;

use crate::config::LoadedConfig;

use super::buffer::{BlockRing, Command, Payload};
use super::zoid::{calculate_trapezoid, target_velocity};
use super::{axis_vector_length, fp_zero};

/// Sentinel "unlimited" velocity for junctions that are effectively
/// straight, and for non-exact-stop path modes [mm/min].
const UNLIMITED_VELOCITY: f64 = 12_345_678.0;

/// Cosine thresholds for the straight-line and reversal junction cases.
const COS_STRAIGHT: f64 = -0.99;
const COS_REVERSAL: f64 = 0.99;

/// The look-ahead planner: block ring plus the planning position.
#[derive(Debug, Default)]
pub struct Planner {
    pub ring: BlockRing,
    /// Final position of the last queued move [mm].
    position: [f64; AXES],
    // Jerk terms cached from the previous move; recomputing the cube root
    // is avoided when consecutive moves share a jerk value.
    prev_jerk: f64,
    prev_recip_jerk: f64,
    prev_cbrt_jerk: f64,
}

impl Planner {
    pub fn new() -> Self {
        Self {
            ring: BlockRing::new(),
            position: [0.0; AXES],
            prev_jerk: 0.0,
            prev_recip_jerk: 0.0,
            prev_cbrt_jerk: 0.0,
        }
    }

    /// The planning position (endpoint of the newest queued move).
    #[inline]
    pub fn position(&self) -> [f64; AXES] {
        self.position
    }

    /// Overwrite the planning position (used on flush and homing).
    pub fn set_position(&mut self, position: [f64; AXES]) {
        self.position = position;
    }

    /// Overwrite one axis of the planning position.
    pub fn set_axis_position(&mut self, axis: usize, position: f64) {
        self.position[axis] = position;
    }

    /// True while queued or running blocks exist.
    #[inline]
    pub fn is_busy(&self) -> bool {
        !self.ring.is_empty()
    }

    /// Append an acceleration-planned line and re-plan the queue.
    ///
    /// `minutes` is the requested move time (already feed- and rate-limit
    /// resolved); `min_time` the fastest the axes could do it.
    ///
    /// # Errors
    ///
    /// - `Status::MinimumLengthMove` — below the plannable minimum; the
    ///   caller's model target still advances so short moves accumulate.
    /// - `Status::BufferFull` — no ring capacity.
    pub fn queue_line(
        &mut self,
        target: [f64; AXES],
        minutes: f64,
        work_offset: [f64; AXES],
        min_time: f64,
        cfg: &LoadedConfig,
        path_control: PathControl,
    ) -> Result<(), Status> {
        let length = axis_vector_length(&target, &self.position);
        if length < MIN_LINE_LENGTH {
            return Err(Status::MinimumLengthMove);
        }
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(Status::InternalRange);
        }

        let index = self.ring.get_write().ok_or(Status::BufferFull)?;

        // Unit vector and the governing jerk: the minimum of the limits of
        // every axis that participates in the move.
        let mut unit = [0.0; AXES];
        let mut jerk = f64::INFINITY;
        for i in 0..AXES {
            let diff = target[i] - self.position[i];
            if !fp_zero(diff) {
                unit[i] = diff / length;
                jerk = jerk.min(cfg.machine.axes[i].jerk_max);
            }
        }
        debug_assert!(jerk.is_finite());

        let (recip_jerk, cbrt_jerk) = if (jerk - self.prev_jerk).abs() < JERK_MATCH_PRECISION {
            (self.prev_recip_jerk, self.prev_cbrt_jerk)
        } else {
            self.prev_jerk = jerk;
            self.prev_recip_jerk = 1.0 / jerk;
            self.prev_cbrt_jerk = jerk.cbrt();
            (self.prev_recip_jerk, self.prev_cbrt_jerk)
        };

        // Whole-block step displacement per motor. Inhibited axes resolve
        // targets but emit no steps.
        let mut motor_steps = [0.0; MOTORS];
        for m in 0..MOTORS {
            let axis = cfg.motor_axis[m];
            if matches!(
                cfg.axis_mode(axis),
                AxisMode::Disabled | AxisMode::Inhibited
            ) {
                continue;
            }
            let i = axis.index();
            motor_steps[m] = (target[i] - self.position[i]) * cfg.steps_per_unit[m];
        }

        let prev_unit = self.ring.block(self.ring.prev(index)).unit;
        let junction_velocity = junction_vmax(cfg, &prev_unit, &unit);

        let replannable = path_control != PathControl::ExactStop;
        let exact_stop = if replannable { UNLIMITED_VELOCITY } else { 0.0 };

        let cruise_vmax = length / minutes;
        let delta_vmax = target_velocity(0.0, length, cbrt_jerk);
        let entry_vmax = cruise_vmax.min(junction_velocity).min(exact_stop);
        let exit_vmax = cruise_vmax.min(entry_vmax + delta_vmax).min(exact_stop);

        let block = self.ring.block_mut(index);
        block.payload = Payload::Line;
        block.replannable = replannable;
        block.target = target;
        block.unit = unit;
        block.motor_steps = motor_steps;
        block.work_offset = work_offset;
        block.length = length;
        block.time = minutes;
        block.min_time = min_time;
        block.cruise_vmax = cruise_vmax;
        block.entry_vmax = entry_vmax;
        block.exit_vmax = exit_vmax;
        block.delta_vmax = delta_vmax;
        block.braking_velocity = delta_vmax;
        block.jerk = jerk;
        block.recip_jerk = recip_jerk;
        block.cbrt_jerk = cbrt_jerk;

        self.ring.commit_write(index);
        self.position = target;

        let mut runtime_entry = false;
        self.plan_block_list(index, &mut runtime_entry);
        Ok(())
    }

    /// Append a synchronous command block.
    ///
    /// Command blocks are planning barriers: they are never replannable and
    /// their zero exit velocity forces the preceding chain to plan down to
    /// a stop, which keeps execution order exact.
    pub fn queue_command(&mut self, command: Command) -> Result<(), Status> {
        let index = self.ring.get_write().ok_or(Status::BufferFull)?;
        self.ring.block_mut(index).payload = Payload::Command(command);
        self.ring.commit_write(index);
        Ok(())
    }

    /// Append a dwell block.
    pub fn queue_dwell(&mut self, seconds: f64) -> Result<(), Status> {
        if !(seconds >= 0.0) || !seconds.is_finite() {
            return Err(Status::InputValueRange);
        }
        let index = self.ring.get_write().ok_or(Status::BufferFull)?;
        self.ring.block_mut(index).payload = Payload::Dwell { seconds };
        self.ring.commit_write(index);
        Ok(())
    }

    /// Empty the ring. The caller re-syncs positions from the runtime.
    pub fn flush(&mut self) {
        self.ring.flush();
    }

    /// Mark every queued block replannable again and re-plan the whole
    /// list with the runtime entry override (used when a feedhold
    /// re-carves the queue from the hold point). Zero-length command and
    /// dwell blocks plan benignly to zero-velocity bodies and keep acting
    /// as barriers.
    pub fn replan_all(&mut self) {
        let mut newest = None;
        let mut indexes = Vec::new();
        for (index, block) in self.ring.occupied() {
            if matches!(
                block.state,
                super::buffer::BlockState::Queued | super::buffer::BlockState::Pending
            ) {
                indexes.push(index);
                newest = Some(index);
            }
        }
        let Some(newest) = newest else {
            return;
        };
        for &index in &indexes {
            self.ring.block_mut(index).replannable = true;
        }
        let mut runtime_entry = true;
        self.plan_block_list(newest, &mut runtime_entry);
    }

    /// Back-plan the chain ending at `bf`.
    ///
    /// Backward pass: from the block before `bf` down to the first block
    /// still replannable, accumulate braking velocity — how much speed the
    /// downstream chain can shed. Forward pass: fix entry velocities from
    /// each predecessor's exit, cap exits against downstream braking, and
    /// recompute every trapezoid. `runtime_entry` forces the first block of
    /// the list to use its own entry cap instead of a predecessor exit
    /// (the predecessor is the in-flight runtime move).
    fn plan_block_list(&mut self, bf: usize, runtime_entry: &mut bool) {
        let ring = &mut self.ring;

        // Backward pass: stop at the first block that is no longer
        // replannable (or after a full wrap). `bp` ends pointing at the
        // block *before* the replannable list.
        let mut bp = bf;
        loop {
            bp = ring.prev(bp);
            if bp == bf || !ring.block(bp).replannable {
                break;
            }
            let nx = ring.next(bp);
            let nx_entry_vmax = ring.block(nx).entry_vmax;
            let nx_braking = ring.block(nx).braking_velocity;
            let block = ring.block_mut(bp);
            block.braking_velocity = nx_entry_vmax.min(nx_braking) + block.delta_vmax;
        }

        // Forward pass over the interior of the list.
        loop {
            bp = ring.next(bp);
            if bp == bf {
                break;
            }
            let prev = ring.prev(bp);
            let entry = if prev == bf || *runtime_entry {
                *runtime_entry = false;
                ring.block(bp).entry_vmax
            } else {
                ring.block(prev).exit_velocity
            };

            let nx = ring.next(bp);
            let nx_braking = ring.block(nx).braking_velocity;
            let nx_entry_vmax = ring.block(nx).entry_vmax;
            let prev_replannable = ring.block(prev).replannable;

            let block = ring.block_mut(bp);
            block.entry_velocity = entry;
            block.cruise_velocity = block.cruise_vmax;
            block.exit_velocity = block
                .exit_vmax
                .min(nx_braking)
                .min(nx_entry_vmax)
                .min(entry + block.delta_vmax);
            calculate_trapezoid(block);

            // Optimally planned blocks stop participating in later passes.
            if block.exit_velocity == block.exit_vmax
                || block.exit_velocity == nx_entry_vmax
                || (!prev_replannable
                    && block.exit_velocity == block.entry_velocity + block.delta_vmax)
            {
                block.replannable = false;
            }
        }

        // Finish the newest block: it always plans to a stop.
        let prev_exit = ring.block(ring.prev(bf)).exit_velocity;
        let entry = if *runtime_entry {
            *runtime_entry = false;
            ring.block(bf).entry_vmax
        } else {
            prev_exit
        };
        let block = ring.block_mut(bf);
        block.entry_velocity = entry.min(block.entry_vmax);
        block.cruise_velocity = block.cruise_vmax;
        block.exit_velocity = 0.0;
        calculate_trapezoid(block);
    }
}

/// Junction velocity from the centripetal-acceleration corner model.
///
/// The effective corner radius comes from the averaged per-axis cornering
/// deviation and the junction angle; the allowable velocity is
/// `sqrt(radius · junction_acceleration)`. Near-straight junctions pass an
/// effectively unlimited velocity; reversals force a stop.
fn junction_vmax(cfg: &LoadedConfig, a_unit: &[f64; AXES], b_unit: &[f64; AXES]) -> f64 {
    let mut costheta = 0.0;
    for i in 0..AXES {
        costheta -= a_unit[i] * b_unit[i];
    }
    if costheta < COS_STRAIGHT {
        return UNLIMITED_VELOCITY;
    }
    if costheta > COS_REVERSAL {
        return 0.0;
    }

    let mut a_delta = 0.0;
    let mut b_delta = 0.0;
    for i in 0..AXES {
        let dev = cfg.machine.axes[i].junction_deviation;
        a_delta += (a_unit[i] * dev) * (a_unit[i] * dev);
        b_delta += (b_unit[i] * dev) * (b_unit[i] * dev);
    }
    let delta = (a_delta.sqrt() + b_delta.sqrt()) / 2.0;
    if fp_zero(delta) {
        return 0.0;
    }

    let sintheta_over2 = ((1.0 - costheta) / 2.0).sqrt();
    let radius = delta * sintheta_over2 / (1.0 - sintheta_over2);
    (radius * cfg.machine.planner.junction_acceleration).sqrt()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::buffer::{Block, BlockState};

    fn planner() -> (Planner, LoadedConfig) {
        (Planner::new(), LoadedConfig::default())
    }

    fn line(
        planner: &mut Planner,
        cfg: &LoadedConfig,
        target: [f64; AXES],
        feed: f64,
    ) -> Result<(), Status> {
        let length = axis_vector_length(&target, &planner.position());
        let minutes = length / feed;
        planner.queue_line(
            target,
            minutes,
            [0.0; AXES],
            minutes,
            cfg,
            PathControl::Continuous,
        )
    }

    fn check_invariants(planner: &Planner) {
        let mut prev_exit: Option<f64> = None;
        for (_, block) in planner.ring.occupied() {
            if !block.is_line() {
                prev_exit = Some(0.0);
                continue;
            }
            assert!(
                block.entry_velocity <= block.cruise_velocity + 1e-6,
                "entry {} > cruise {}",
                block.entry_velocity,
                block.cruise_velocity
            );
            assert!(
                block.exit_velocity <= block.cruise_velocity + 1e-6,
                "exit {} > cruise {}",
                block.exit_velocity,
                block.cruise_velocity
            );
            let sum = block.head_length + block.body_length + block.tail_length;
            assert!(
                (sum - block.length).abs() <= 1e-5 * block.length.max(1.0),
                "sections {} != length {}",
                sum,
                block.length
            );
            if let Some(exit) = prev_exit {
                assert!(
                    block.entry_velocity <= exit + 1e-6,
                    "entry {} > previous exit {}",
                    block.entry_velocity,
                    exit
                );
            }
            prev_exit = Some(block.exit_velocity);
        }
    }

    #[test]
    fn short_line_is_rejected_without_queueing() {
        let (mut planner, cfg) = planner();
        let err = line(&mut planner, &cfg, [0.01, 0.0, 0.0, 0.0, 0.0, 0.0], 1000.0);
        assert_eq!(err, Err(Status::MinimumLengthMove));
        assert!(!planner.is_busy());
        assert_eq!(planner.position()[0], 0.0);
    }

    #[test]
    fn single_line_plans_to_rest() {
        let (mut planner, cfg) = planner();
        line(&mut planner, &cfg, [10.0, 0.0, 0.0, 0.0, 0.0, 0.0], 1200.0).unwrap();
        let (_, block) = planner.ring.occupied().next().unwrap();
        assert_eq!(block.entry_velocity, 0.0);
        assert_eq!(block.exit_velocity, 0.0);
        assert!((block.cruise_vmax - 1200.0).abs() < 1e-9);
        check_invariants(&planner);
    }

    #[test]
    fn collinear_lines_keep_speed_at_junction() {
        let (mut planner, cfg) = planner();
        line(&mut planner, &cfg, [10.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();
        line(&mut planner, &cfg, [20.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();
        let blocks: Vec<&Block> = planner.ring.occupied().map(|(_, b)| b).collect();
        // The junction between collinear moves does not force a slowdown:
        // the first block's exit equals the second block's entry, well
        // above zero.
        assert!(blocks[0].exit_velocity > 1000.0);
        assert!((blocks[0].exit_velocity - blocks[1].entry_velocity).abs() < 1e-6);
        check_invariants(&planner);
    }

    #[test]
    fn right_angle_junction_slows_down() {
        let (mut planner, cfg) = planner();
        line(&mut planner, &cfg, [10.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();
        line(&mut planner, &cfg, [10.0, 10.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();
        let blocks: Vec<&Block> = planner.ring.occupied().map(|(_, b)| b).collect();
        let corner = blocks[0].exit_velocity;
        assert!(corner < 3000.0, "corner velocity {corner} not limited");
        check_invariants(&planner);
    }

    #[test]
    fn reversal_junction_stops() {
        let (mut planner, cfg) = planner();
        line(&mut planner, &cfg, [10.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();
        line(&mut planner, &cfg, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();
        let blocks: Vec<&Block> = planner.ring.occupied().map(|(_, b)| b).collect();
        assert_eq!(blocks[0].exit_velocity, 0.0);
        assert_eq!(blocks[1].entry_velocity, 0.0);
    }

    #[test]
    fn exact_stop_mode_zeroes_junctions() {
        let (mut planner, cfg) = planner();
        let target = [10.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        planner
            .queue_line(
                target,
                10.0 / 3000.0,
                [0.0; AXES],
                10.0 / 3000.0,
                &cfg,
                PathControl::ExactStop,
            )
            .unwrap();
        let (_, block) = planner.ring.occupied().next().unwrap();
        assert_eq!(block.entry_vmax, 0.0);
        assert_eq!(block.exit_vmax, 0.0);
        assert!(!block.replannable);
    }

    #[test]
    fn many_short_lines_honor_invariants() {
        let (mut planner, cfg) = planner();
        // A zig-zag staircase of short segments exercises junctions and
        // back-planning together.
        let mut x = 0.0;
        let mut y = 0.0;
        for i in 0..12 {
            if i % 2 == 0 {
                x += 1.5;
            } else {
                y += 1.0;
            }
            line(&mut planner, &cfg, [x, y, 0.0, 0.0, 0.0, 0.0], 6000.0).unwrap();
        }
        check_invariants(&planner);
    }

    #[test]
    fn command_block_is_a_planning_barrier() {
        let (mut planner, cfg) = planner();
        line(&mut planner, &cfg, [10.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();
        planner
            .queue_command(Command::ChangeTool { tool: 2 })
            .unwrap();
        line(&mut planner, &cfg, [20.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();

        let blocks: Vec<&Block> = planner.ring.occupied().map(|(_, b)| b).collect();
        // The line before the command planned down to a stop, and the line
        // after it starts from rest.
        assert_eq!(blocks[0].exit_velocity, 0.0);
        assert_eq!(blocks[2].entry_velocity, 0.0);
    }

    #[test]
    fn ring_full_returns_buffer_full() {
        let (mut planner, cfg) = planner();
        let mut x = 0.0;
        loop {
            x += 1.0;
            match line(&mut planner, &cfg, [x, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0) {
                Ok(()) => continue,
                Err(Status::BufferFull) => break,
                Err(other) => panic!("unexpected status {other:?}"),
            }
        }
        assert_eq!(planner.ring.available(), 0);
        // The planning position did not advance for the rejected move.
        assert_eq!(planner.position()[0], x - 1.0);
    }

    #[test]
    fn queue_order_is_preserved() {
        let (mut planner, cfg) = planner();
        line(&mut planner, &cfg, [5.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();
        planner.queue_dwell(0.5).unwrap();
        planner
            .queue_command(Command::SelectTool { tool: 3 })
            .unwrap();
        line(&mut planner, &cfg, [10.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3000.0).unwrap();

        let kinds: Vec<&Payload> = planner.ring.occupied().map(|(_, b)| &b.payload).collect();
        assert!(matches!(kinds[0], Payload::Line));
        assert!(matches!(kinds[1], Payload::Dwell { .. }));
        assert!(matches!(kinds[2], Payload::Command(_)));
        assert!(matches!(kinds[3], Payload::Line));
        assert_eq!(
            planner.ring.occupied().next().unwrap().1.state,
            BlockState::Pending
        );
    }
}
