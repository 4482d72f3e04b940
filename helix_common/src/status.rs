//! Status codes for fallible core operations.
//!
//! Every canonical-machine and planner operation returns `Result<_, Status>`.
//! The numeric codes are stable and surface in exception reports; gaps in
//! the numbering are reserved.

use thiserror::Error;

/// Error statuses surfaced by the motion core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u8)]
pub enum Status {
    /// Buffer pool is full and cannot accept the operation.
    #[error("planner buffer pool is full")]
    BufferFull = 13,

    /// Unrecoverable internal inconsistency.
    #[error("internal error")]
    Internal = 20,

    /// A computed value fell outside its internal range.
    #[error("internal range error")]
    InternalRange = 21,

    /// Machine is in alarm state; motion is rejected.
    #[error("machine is in alarm state")]
    Alarm = 27,

    /// An input value is out of its permitted range.
    #[error("input value out of range")]
    InputValueRange = 46,

    /// Move resolves to zero length (reported internally, not to callers).
    #[error("move is zero length")]
    ZeroLengthMove = 60,

    /// Move is shorter than the minimum plannable line. The model target
    /// still advances, so consecutive short moves accumulate.
    #[error("move is below minimum line length")]
    MinimumLengthMove = 61,

    /// A feed move was issued without a feed rate.
    #[error("feed move has no feed rate")]
    FeedRate = 63,

    /// Target exceeds the configured axis travel.
    #[error("target exceeds maximum travel")]
    MaxTravelExceeded = 67,

    /// Arc has neither valid center offsets nor a workable radius.
    #[error("arc specification error")]
    ArcSpecification = 69,

    /// Segment run time fell below the minimum the loader can schedule.
    #[error("move time below minimum segment time")]
    MinimumTimeMove = 70,
}

impl Status {
    /// Stable numeric code for the report surface.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
