//! Report surface: status, queue and exception reports.
//!
//! The core raises report *requests*; a transport collaborator drains them.
//! Report structs serialize so the collaborator can ship them as JSON or
//! text unchanged.

use serde::Serialize;
use tracing::error;

use helix_common::consts::AXES;
use helix_common::gcode::{CoordSystem, Units};
use helix_common::state::{CombinedState, CycleState, HoldState, MachineState, MotionState};
use helix_common::status::Status;

/// Snapshot of machine state for the status-report channel.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub machine_state: MachineState,
    pub cycle_state: CycleState,
    pub motion_state: MotionState,
    pub hold_state: HoldState,
    pub combined_state: CombinedState,
    /// Work position in external units.
    pub position: [f64; AXES],
    /// Current path velocity [mm/min].
    pub velocity: f64,
    pub units: Units,
    pub coord_system: CoordSystem,
    pub feed_rate: f64,
}

/// Planner queue occupancy snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueReport {
    pub buffers_available: usize,
}

/// An asynchronous exception with its numeric status code.
#[derive(Debug, Clone, Serialize)]
pub struct ExceptionReport {
    pub code: u8,
    pub message: String,
}

/// Pending report requests, drained by the transport collaborator.
#[derive(Debug, Default)]
pub struct Reports {
    status_requested: bool,
    queue_requested: bool,
    exceptions: Vec<ExceptionReport>,
}

impl Reports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a status report at the next drain.
    pub fn request_status(&mut self) {
        self.status_requested = true;
    }

    /// Ask for a queue report at the next drain.
    pub fn request_queue(&mut self) {
        self.queue_requested = true;
    }

    /// Record an exception. Also logged immediately, since exception
    /// reports must not wait for a polite drain.
    pub fn exception(&mut self, status: Status, context: &str) {
        error!(code = status.code(), %status, context, "exception");
        self.exceptions.push(ExceptionReport {
            code: status.code(),
            message: format!("{status}: {context}"),
        });
    }

    /// Take the status request flag.
    pub fn take_status_request(&mut self) -> bool {
        std::mem::take(&mut self.status_requested)
    }

    /// Take the queue request flag.
    pub fn take_queue_request(&mut self) -> bool {
        std::mem::take(&mut self.queue_requested)
    }

    /// Drain pending exceptions.
    pub fn take_exceptions(&mut self) -> Vec<ExceptionReport> {
        std::mem::take(&mut self.exceptions)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
