//! Arc-to-chord decomposition.
//!
//! An arc move is flattened into short straight chords fed to the line
//! planner. Chord count is chosen so the sagitta (chord error) stays inside
//! the configured tolerance, bounded by the minimum arc segment time and
//! the minimum plannable line length. The generator runs incrementally:
//! each `fill` call queues as many chords as the ring will take, so long
//! arcs never starve the planner or block the caller.

use helix_common::axis::Axis;
use helix_common::consts::{AXES, MIN_ARC_SEGMENT_TIME, MIN_LINE_LENGTH};
use helix_common::gcode::PathControl;
use helix_common::status::Status;

use crate::config::LoadedConfig;

use super::line::Planner;

/// Incremental arc chord generator.
#[derive(Debug)]
pub struct ArcGenerator {
    active: bool,

    /// Accumulating position along the arc [mm].
    position: [f64; AXES],
    /// Final arc endpoint [mm].
    target: [f64; AXES],
    work_offset: [f64; AXES],

    /// Current angle around the center [rad].
    theta: f64,
    radius: f64,

    segments: u32,
    segment_count: u32,
    segment_theta: f64,
    segment_linear: f64,
    /// Time per chord [min].
    segment_time: f64,
    /// Minimum time per chord [min].
    segment_min_time: f64,

    center_0: f64,
    center_1: f64,
    axis_0: Axis,
    axis_1: Axis,
    axis_linear: Axis,
}

impl Default for ArcGenerator {
    fn default() -> Self {
        Self {
            active: false,
            position: [0.0; AXES],
            target: [0.0; AXES],
            work_offset: [0.0; AXES],
            theta: 0.0,
            radius: 0.0,
            segments: 0,
            segment_count: 0,
            segment_theta: 0.0,
            segment_linear: 0.0,
            segment_time: 0.0,
            segment_min_time: 0.0,
            center_0: 0.0,
            center_1: 0.0,
            axis_0: Axis::X,
            axis_1: Axis::Y,
            axis_linear: Axis::Z,
        }
    }
}

impl ArcGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while chords remain to be queued.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Set up a new arc. Geometry (center, start angle, sweep) has already
    /// been resolved by the canonical machine.
    #[allow(clippy::too_many_arguments)]
    pub fn begin(
        &mut self,
        position: [f64; AXES],
        target: [f64; AXES],
        theta_start: f64,
        radius: f64,
        angular_travel: f64,
        linear_travel: f64,
        plane_axes: (Axis, Axis, Axis),
        minutes: f64,
        min_time: f64,
        work_offset: [f64; AXES],
        chord_tolerance: f64,
    ) -> Result<(), Status> {
        if radius <= 0.0 || angular_travel == 0.0 {
            return Err(Status::ArcSpecification);
        }
        let length = (angular_travel * radius).hypot(linear_travel);
        if length < MIN_LINE_LENGTH {
            return Err(Status::MinimumLengthMove);
        }

        // Sagitta bound: a chord spanning dθ has error r·(1−cos(dθ/2)).
        let ratio = (chord_tolerance / radius).min(1.0);
        let chord_angle = 2.0 * (1.0 - ratio).acos();
        let needed = if chord_angle > 0.0 {
            (angular_travel.abs() / chord_angle).ceil()
        } else {
            1.0
        };
        let max_by_time = (minutes / MIN_ARC_SEGMENT_TIME).floor();
        let max_by_length = (length / MIN_LINE_LENGTH).floor();
        let segments = needed.min(max_by_time).min(max_by_length).max(1.0) as u32;

        let (axis_0, axis_1, axis_linear) = plane_axes;
        let center_0 = position[axis_0.index()] - radius * theta_start.cos();
        let center_1 = position[axis_1.index()] - radius * theta_start.sin();

        self.active = true;
        self.position = position;
        self.target = target;
        self.work_offset = work_offset;
        self.theta = theta_start;
        self.radius = radius;
        self.segments = segments;
        self.segment_count = segments;
        self.segment_theta = angular_travel / segments as f64;
        self.segment_linear = linear_travel / segments as f64;
        self.segment_time = minutes / segments as f64;
        self.segment_min_time = min_time / segments as f64;
        self.center_0 = center_0;
        self.center_1 = center_1;
        self.axis_0 = axis_0;
        self.axis_1 = axis_1;
        self.axis_linear = axis_linear;
        Ok(())
    }

    /// Queue chords while the ring has room. Returns `true` when the arc
    /// has been fully handed to the planner.
    pub fn fill(
        &mut self,
        planner: &mut Planner,
        cfg: &LoadedConfig,
        path_control: PathControl,
    ) -> Result<bool, Status> {
        if !self.active {
            return Ok(true);
        }
        while self.segment_count > 0 {
            if planner.ring.available() == 0 {
                return Ok(false);
            }

            let next_theta = self.theta + self.segment_theta;
            let mut chord = self.position;
            if self.segment_count == 1 {
                // Final chord lands exactly on the endpoint, absorbing the
                // accumulated floating-point drift of the polar walk.
                chord = self.target;
            } else {
                chord[self.axis_0.index()] = self.center_0 + self.radius * next_theta.cos();
                chord[self.axis_1.index()] = self.center_1 + self.radius * next_theta.sin();
                chord[self.axis_linear.index()] += self.segment_linear;
            }

            match planner.queue_line(
                chord,
                self.segment_time,
                self.work_offset,
                self.segment_min_time,
                cfg,
                path_control,
            ) {
                Ok(()) => {}
                // Chords below the plannable minimum accumulate into the
                // next one, same as short lines from the interpreter.
                Err(Status::MinimumLengthMove) => {}
                Err(Status::BufferFull) => return Ok(false),
                Err(other) => {
                    self.active = false;
                    return Err(other);
                }
            }
            self.theta = next_theta;
            self.position = chord;
            self.segment_count -= 1;
        }
        self.active = false;
        Ok(true)
    }

    /// Drop the remainder of the arc (queue flush, alarm).
    pub fn abort(&mut self) {
        self.active = false;
        self.segment_count = 0;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::axis_vector_length;
    use std::f64::consts::PI;

    fn setup() -> (ArcGenerator, Planner, LoadedConfig) {
        (ArcGenerator::new(), Planner::new(), LoadedConfig::default())
    }

    /// Quarter circle, CCW, from (10,0) to (0,10) around the origin.
    fn begin_quarter(arc: &mut ArcGenerator, feed: f64) {
        let start = [10.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let target = [0.0, 10.0, 0.0, 0.0, 0.0, 0.0];
        let length = (PI / 2.0) * 10.0;
        arc.begin(
            start,
            target,
            0.0,
            10.0,
            PI / 2.0,
            0.0,
            (Axis::X, Axis::Y, Axis::Z),
            length / feed,
            length / feed,
            [0.0; AXES],
            0.01,
        )
        .unwrap();
    }

    #[test]
    fn chords_stay_on_the_circle() {
        let (mut arc, mut planner, cfg) = setup();
        planner.set_position([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        begin_quarter(&mut arc, 1000.0);
        assert!(arc.fill(&mut planner, &cfg, PathControl::Continuous).unwrap());

        for (_, block) in planner.ring.occupied() {
            let r = block.target[0].hypot(block.target[1]);
            assert!(
                (r - 10.0).abs() < 1e-6,
                "chord endpoint off circle: r = {r}"
            );
        }
    }

    #[test]
    fn final_chord_lands_on_endpoint() {
        let (mut arc, mut planner, cfg) = setup();
        planner.set_position([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        begin_quarter(&mut arc, 1000.0);
        assert!(arc.fill(&mut planner, &cfg, PathControl::Continuous).unwrap());
        assert_eq!(planner.position(), [0.0, 10.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn chord_error_within_tolerance() {
        let (mut arc, mut planner, cfg) = setup();
        planner.set_position([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        begin_quarter(&mut arc, 1000.0);
        arc.fill(&mut planner, &cfg, PathControl::Continuous).unwrap();

        // Walk consecutive chord endpoints; the sagitta of each chord must
        // stay within the configured 0.01 mm.
        let ends: Vec<[f64; AXES]> =
            planner.ring.occupied().map(|(_, b)| b.target).collect();
        let mut prev = [10.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        for end in ends {
            let mid = [(prev[0] + end[0]) / 2.0, (prev[1] + end[1]) / 2.0];
            let sagitta = 10.0 - mid[0].hypot(mid[1]);
            assert!(sagitta <= 0.0105, "sagitta {sagitta} exceeds tolerance");
            prev = end;
        }
    }

    #[test]
    fn helical_component_interpolates_linearly() {
        let (mut arc, mut planner, cfg) = setup();
        planner.set_position([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let start = [10.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let target = [0.0, 10.0, 4.0, 0.0, 0.0, 0.0];
        let length = ((PI / 2.0) * 10.0_f64).hypot(4.0);
        arc.begin(
            start,
            target,
            0.0,
            10.0,
            PI / 2.0,
            4.0,
            (Axis::X, Axis::Y, Axis::Z),
            length / 1000.0,
            length / 1000.0,
            [0.0; AXES],
            0.01,
        )
        .unwrap();
        assert!(arc.fill(&mut planner, &cfg, PathControl::Continuous).unwrap());

        // Z advances proportionally to arc progress.
        let blocks: Vec<[f64; AXES]> =
            planner.ring.occupied().map(|(_, b)| b.target).collect();
        let n = blocks.len() as f64;
        for (i, target) in blocks.iter().enumerate() {
            let expected = 4.0 * (i as f64 + 1.0) / n;
            assert!(
                (target[2] - expected).abs() < 0.5,
                "z {} far from linear ramp {expected}",
                target[2]
            );
        }
        assert_eq!(planner.position()[2], 4.0);
    }

    #[test]
    fn fill_resumes_when_ring_drains() {
        let (mut arc, mut planner, cfg) = setup();
        planner.set_position([100.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        // Big radius and tight tolerance force more chords than the ring
        // can hold at once.
        let start = [100.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let target = [-100.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let length = PI * 100.0;
        arc.begin(
            start,
            target,
            0.0,
            100.0,
            PI,
            0.0,
            (Axis::X, Axis::Y, Axis::Z),
            length / 2000.0,
            length / 2000.0,
            [0.0; AXES],
            0.001,
        )
        .unwrap();

        let done = arc.fill(&mut planner, &cfg, PathControl::Continuous).unwrap();
        assert!(!done, "ring should fill before the arc is exhausted");
        assert_eq!(planner.ring.available(), 0);

        // Drain the ring and keep filling until the arc completes.
        let mut guard = 0;
        loop {
            while planner.ring.run_block().is_some() {
                planner.ring.free_run();
            }
            if arc.fill(&mut planner, &cfg, PathControl::Continuous).unwrap() {
                break;
            }
            guard += 1;
            assert!(guard < 100, "arc never completed");
        }
        let final_pos = planner.position();
        assert!(axis_vector_length(&final_pos, &target) < 1e-9);
    }

    #[test]
    fn degenerate_arc_is_rejected() {
        let (mut arc, _, _) = setup();
        let err = arc.begin(
            [0.0; AXES],
            [0.0; AXES],
            0.0,
            0.0,
            PI,
            0.0,
            (Axis::X, Axis::Y, Axis::Z),
            0.01,
            0.01,
            [0.0; AXES],
            0.01,
        );
        assert_eq!(err, Err(Status::ArcSpecification));
    }
}
