//! Axis identifiers and axis modes.
//!
//! The axis set is fixed: three linear axes {X, Y, Z} followed by three
//! rotary axes {A, B, C}. Array-indexed state throughout the controller uses
//! `Axis as usize` as the index.

use serde::{Deserialize, Serialize};

use crate::consts::AXES;

/// Axis identifier, usable directly as an array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
    A = 3,
    B = 4,
    C = 5,
}

impl Axis {
    /// All axes in canonical order.
    pub const ALL: [Axis; AXES] = [Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B, Axis::C];

    /// The linear axes.
    pub const LINEAR: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// The rotary axes.
    pub const ROTARY: [Axis; 3] = [Axis::A, Axis::B, Axis::C];

    /// Convert from an array index. Returns `None` for invalid values.
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::X),
            1 => Some(Self::Y),
            2 => Some(Self::Z),
            3 => Some(Self::A),
            4 => Some(Self::B),
            5 => Some(Self::C),
            _ => None,
        }
    }

    /// Array index of this axis.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns true for A, B and C.
    #[inline]
    pub const fn is_rotary(self) -> bool {
        (self as usize) >= 3
    }
}

/// Per-axis operating mode.
///
/// Inhibited axes resolve targets normally but are suppressed at the stepper
/// output. Radius mode applies to rotary axes only: incoming linear values
/// are converted to degrees through the configured radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AxisMode {
    /// Axis ignores incoming words entirely.
    Disabled = 0,
    /// Normal operation.
    #[default]
    Standard = 1,
    /// Target is computed but no steps are emitted.
    Inhibited = 2,
    /// Rotary axis driven by linear input through a radius (ABC only).
    Radius = 3,
}

impl AxisMode {
    /// Whether incoming words participate in target resolution.
    #[inline]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
