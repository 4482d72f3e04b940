//! G-code modal enums and unit conversion.
//!
//! All internal coordinates are millimeters (linear) and degrees (rotary);
//! conversion from inches happens once, at ingestion.

use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::consts::MM_PER_INCH;

/// Linear units mode (G20/G21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    /// G20.
    Inches,
    /// G21.
    #[default]
    Millimeters,
}

/// Convert an incoming linear value to millimeters.
#[inline]
pub fn to_millimeters(value: f64, units: Units) -> f64 {
    match units {
        Units::Inches => value * MM_PER_INCH,
        Units::Millimeters => value,
    }
}

/// Convert a canonical millimeter value to the external units.
#[inline]
pub fn from_millimeters(value: f64, units: Units) -> f64 {
    match units {
        Units::Inches => value / MM_PER_INCH,
        Units::Millimeters => value,
    }
}

/// Distance mode (G90/G91).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMode {
    /// G90.
    #[default]
    Absolute,
    /// G91.
    Incremental,
}

/// Coordinate system selection (G53..G59).
///
/// `Absolute` (G53) is the machine frame; its offsets are fixed at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum CoordSystem {
    /// G53 — machine coordinates, zero offset.
    #[serde(rename = "G53")]
    Absolute = 0,
    #[default]
    G54 = 1,
    G55 = 2,
    G56 = 3,
    G57 = 4,
    G58 = 5,
    G59 = 6,
}

impl CoordSystem {
    /// Convert from the P word of G10 (1..=6 → G54..G59).
    #[inline]
    pub const fn from_p_word(p: u8) -> Option<Self> {
        match p {
            1 => Some(Self::G54),
            2 => Some(Self::G55),
            3 => Some(Self::G56),
            4 => Some(Self::G57),
            5 => Some(Self::G58),
            6 => Some(Self::G59),
            _ => None,
        }
    }

    /// Index into the work-offset table (G54 → 0). `None` for G53.
    #[inline]
    pub const fn work_index(self) -> Option<usize> {
        match self {
            Self::Absolute => None,
            _ => Some(self as usize - 1),
        }
    }
}

/// Arc plane selection (G17/G18/G19).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Plane {
    /// G17.
    #[default]
    Xy,
    /// G18.
    Xz,
    /// G19.
    Yz,
}

impl Plane {
    /// The (primary, secondary, normal) axis triple of this plane.
    ///
    /// The normal axis carries the helical component of an arc.
    #[inline]
    pub const fn axes(self) -> (Axis, Axis, Axis) {
        match self {
            Self::Xy => (Axis::X, Axis::Y, Axis::Z),
            Self::Xz => (Axis::X, Axis::Z, Axis::Y),
            Self::Yz => (Axis::Y, Axis::Z, Axis::X),
        }
    }
}

/// Path control mode (G61/G61.1/G64).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathControl {
    /// G61 — come to a full stop at every junction.
    ExactStop,
    /// G61.1.
    ExactPath,
    /// G64.
    #[default]
    Continuous,
}

/// Active motion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    /// G80 — no active motion mode. A machine never starts in a motion mode.
    #[default]
    Cancel,
    /// G0.
    StraightTraverse,
    /// G1.
    StraightFeed,
    /// G2.
    CwArc,
    /// G3.
    CcwArc,
    /// G38.2.
    Probe,
}

/// Spindle rotation mode (M3/M4/M5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpindleMode {
    /// M5.
    #[default]
    Off,
    /// M3.
    Cw,
    /// M4.
    Ccw,
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inch_round_trip_is_identity() {
        for value in [0.0, 1.0, 0.001, 123.456, -25.4] {
            let mm = to_millimeters(value, Units::Inches);
            let back = from_millimeters(mm, Units::Inches);
            assert!((back - value).abs() <= f64::EPSILON * value.abs().max(1.0));
        }
    }

    #[test]
    fn millimeters_pass_through() {
        assert_eq!(to_millimeters(42.0, Units::Millimeters), 42.0);
    }

    #[test]
    fn coord_system_work_index() {
        assert_eq!(CoordSystem::Absolute.work_index(), None);
        assert_eq!(CoordSystem::G54.work_index(), Some(0));
        assert_eq!(CoordSystem::G59.work_index(), Some(5));
    }

    #[test]
    fn g10_p_word_mapping() {
        assert_eq!(CoordSystem::from_p_word(1), Some(CoordSystem::G54));
        assert_eq!(CoordSystem::from_p_word(6), Some(CoordSystem::G59));
        assert_eq!(CoordSystem::from_p_word(0), None);
        assert_eq!(CoordSystem::from_p_word(7), None);
    }

    #[test]
    fn plane_axis_triples() {
        assert_eq!(Plane::Xy.axes(), (Axis::X, Axis::Y, Axis::Z));
        assert_eq!(Plane::Xz.axes(), (Axis::X, Axis::Z, Axis::Y));
        assert_eq!(Plane::Yz.axes(), (Axis::Y, Axis::Z, Axis::X));
    }
}
