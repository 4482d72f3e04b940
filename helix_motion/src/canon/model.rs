//! The G-code model: modal state and canonical target resolution.
//!
//! All positions here are canonical — millimeters, degrees, absolute
//! machine coordinates. Incoming block words are native (unit- and
//! frame-relative); the setters do the conversions exactly once.

use helix_common::axis::{Axis, AxisMode};
use helix_common::consts::AXES;
use helix_common::gcode::{
    to_millimeters, CoordSystem, DistanceMode, MotionMode, PathControl, Plane, SpindleMode, Units,
};
use helix_common::status::Status;

use crate::config::LoadedConfig;
use crate::plan::fp_zero;

/// Modal G-code state, one instance per session.
#[derive(Debug, Clone)]
pub struct GcodeModel {
    /// Model position [mm]. Leads the runtime: it becomes the target as
    /// soon as a move is accepted.
    pub position: [f64; AXES],
    /// Resolved target of the current block [mm].
    pub target: [f64; AXES],

    pub units: Units,
    pub distance_mode: DistanceMode,
    pub coord_system: CoordSystem,
    /// G53 one-shot: ignore all work offsets for this block.
    pub absolute_override: bool,
    /// G92 origin offset [mm].
    pub origin_offset: [f64; AXES],
    pub origin_offset_enable: bool,

    pub plane: Plane,
    pub motion_mode: MotionMode,
    pub path_control: PathControl,

    /// Feed rate [mm/min].
    pub feed_rate: f64,
    pub inverse_feed_rate_mode: bool,
    /// Move time for the current block in G93 mode [min].
    pub inverse_feed_rate: f64,

    pub spindle_mode: SpindleMode,
    pub spindle_speed: f64,
    pub mist_coolant: bool,
    pub flood_coolant: bool,
    pub tool: u8,

    /// IJK offsets of the current arc block [mm].
    pub arc_offset: [f64; 3],
    /// R word of the current arc block [mm].
    pub arc_radius: f64,

    /// G28 park point [mm].
    pub g28_position: [f64; AXES],
    /// G30 park point [mm].
    pub g30_position: [f64; AXES],

    // Override enables and factors. Stored for subsequent planning; they
    // do not replan moves already queued.
    pub feed_override_enable: bool,
    pub feed_override_factor: f64,
    pub traverse_override_enable: bool,
    pub traverse_override_factor: f64,
    pub spindle_override_enable: bool,
    pub spindle_override_factor: f64,
}

impl Default for GcodeModel {
    fn default() -> Self {
        Self {
            position: [0.0; AXES],
            target: [0.0; AXES],
            units: Units::default(),
            distance_mode: DistanceMode::default(),
            coord_system: CoordSystem::default(),
            absolute_override: false,
            origin_offset: [0.0; AXES],
            origin_offset_enable: false,
            plane: Plane::default(),
            motion_mode: MotionMode::Cancel,
            path_control: PathControl::default(),
            feed_rate: 0.0,
            inverse_feed_rate_mode: false,
            inverse_feed_rate: 0.0,
            spindle_mode: SpindleMode::Off,
            spindle_speed: 0.0,
            mist_coolant: false,
            flood_coolant: false,
            tool: 0,
            arc_offset: [0.0; 3],
            arc_radius: 0.0,
            g28_position: [0.0; AXES],
            g30_position: [0.0; AXES],
            feed_override_enable: false,
            feed_override_factor: 1.0,
            traverse_override_enable: false,
            traverse_override_factor: 1.0,
            spindle_override_enable: false,
            spindle_override_factor: 1.0,
        }
    }
}

impl GcodeModel {
    /// Convert an incoming linear word to millimeters.
    #[inline]
    pub fn to_mm(&self, value: f64) -> f64 {
        to_millimeters(value, self.units)
    }

    /// Effective work offset of `axis`: the selected coordinate system
    /// plus the G92 component when enabled; zero under G53 override.
    pub fn coord_offset(&self, cfg: &LoadedConfig, axis: Axis) -> f64 {
        if self.absolute_override {
            return 0.0;
        }
        let base = cfg.offset(self.coord_system, axis);
        if self.origin_offset_enable {
            base + self.origin_offset[axis.index()]
        } else {
            base
        }
    }

    /// Effective work offsets for all axes.
    pub fn coord_offset_vector(&self, cfg: &LoadedConfig) -> [f64; AXES] {
        let mut offsets = [0.0; AXES];
        for axis in Axis::ALL {
            offsets[axis.index()] = self.coord_offset(cfg, axis);
        }
        offsets
    }

    /// Model position of `axis` in the work frame and external units.
    pub fn work_position(&self, cfg: &LoadedConfig, axis: Axis) -> f64 {
        let canonical = self.position[axis.index()] - self.coord_offset(cfg, axis);
        if axis.is_rotary() {
            canonical
        } else {
            helix_common::gcode::from_millimeters(canonical, self.units)
        }
    }

    /// Resolve flagged block words into the canonical target.
    ///
    /// Linear axes convert units and apply the work offset (absolute) or
    /// accumulate (incremental). Rotary axes take degrees directly, except
    /// in radius mode where incoming linear displacement becomes angular
    /// through the configured radius. Disabled axes ignore their words;
    /// inhibited axes resolve normally (suppression happens at the
    /// stepper output).
    ///
    /// The target is committed even when the subsequent travel check
    /// fails, so successive under-minimum moves accumulate.
    pub fn set_target(
        &mut self,
        cfg: &LoadedConfig,
        words: &[Option<f64>; AXES],
    ) -> Result<(), Status> {
        for axis in Axis::LINEAR {
            let i = axis.index();
            let Some(value) = words[i] else { continue };
            match cfg.axis_mode(axis) {
                AxisMode::Standard | AxisMode::Inhibited => {
                    if self.distance_mode == DistanceMode::Absolute {
                        self.target[i] = self.coord_offset(cfg, axis) + self.to_mm(value);
                    } else {
                        self.target[i] += self.to_mm(value);
                    }
                }
                _ => {}
            }
        }
        for axis in Axis::ROTARY {
            let i = axis.index();
            let Some(value) = words[i] else { continue };
            let degrees = match cfg.axis_mode(axis) {
                // Degrees come in as degrees; no unit scaling.
                AxisMode::Standard | AxisMode::Inhibited => value,
                AxisMode::Radius => {
                    let radius = cfg.axis(axis).radius;
                    self.to_mm(value) * 360.0 / (2.0 * std::f64::consts::PI * radius)
                }
                AxisMode::Disabled => continue,
            };
            if self.distance_mode == DistanceMode::Absolute {
                self.target[i] = degrees + self.coord_offset(cfg, axis);
            } else {
                self.target[i] += degrees;
            }
        }

        for axis in Axis::ALL {
            let i = axis.index();
            if !cfg.axis_mode(axis).is_active() {
                continue;
            }
            let axis_cfg = cfg.axis(axis);
            if self.target[i] < axis_cfg.travel_min || self.target[i] > axis_cfg.travel_max {
                return Err(Status::MaxTravelExceeded);
            }
        }
        Ok(())
    }

    /// Commit the target as the new model position after a successful
    /// move. On error the position is left alone so short moves can
    /// accumulate into plannable ones.
    #[inline]
    pub fn finalize_move(&mut self, result: &Result<(), Status>) {
        if result.is_ok() {
            self.position = self.target;
        }
    }

    /// True when the resolved target equals the current position.
    pub fn target_is_position(&self) -> bool {
        self.target
            .iter()
            .zip(self.position.iter())
            .all(|(t, p)| fp_zero(t - p))
    }

    /// Optimal and minimum move times [min] for the current target.
    ///
    /// The optimal time is the longest of: the G93 inverse time, the
    /// coordinated XYZ time at the requested feed (or the rotary time for
    /// rotary-only feeds, per NIST 2.1.2.5), and the time demanded by the
    /// rate-limiting axis. The minimum time is the fastest any single
    /// axis constraint would allow.
    pub fn move_times(&self, cfg: &LoadedConfig) -> (f64, f64) {
        let mut inverse_time = 0.0;
        let mut xyz_time = 0.0;
        let mut abc_time = 0.0;

        if self.motion_mode == MotionMode::StraightFeed {
            if self.inverse_feed_rate_mode {
                inverse_time = self.inverse_feed_rate;
            } else {
                let dx = self.target[0] - self.position[0];
                let dy = self.target[1] - self.position[1];
                let dz = self.target[2] - self.position[2];
                xyz_time = (dx * dx + dy * dy + dz * dz).sqrt() / self.feed_rate;
                if fp_zero(xyz_time) {
                    let da = self.target[3] - self.position[3];
                    let db = self.target[4] - self.position[4];
                    let dc = self.target[5] - self.position[5];
                    abc_time = (da * da + db * db + dc * dc).sqrt() / self.feed_rate;
                }
            }
        }

        let mut max_time: f64 = 0.0;
        let mut min_time = f64::MAX;
        for axis in Axis::ALL {
            let i = axis.index();
            let limit = if self.motion_mode == MotionMode::StraightFeed {
                cfg.axis(axis).feedrate_max
            } else {
                cfg.axis(axis).velocity_max
            };
            let axis_time = (self.target[i] - self.position[i]).abs() / limit;
            max_time = max_time.max(axis_time);
            min_time = min_time.min(axis_time);
        }

        (
            inverse_time.max(max_time).max(xyz_time).max(abc_time),
            min_time,
        )
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
