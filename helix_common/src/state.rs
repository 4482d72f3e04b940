//! Machine, cycle, motion and feedhold state enums.
//!
//! Four raw state variables describe the controller; `combined_state()`
//! projects them into the single value surfaced by status reports.

use serde::{Deserialize, Serialize};

/// Global machine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MachineState {
    /// Initialised and accepting blocks.
    #[default]
    Ready = 0,
    /// Fatal condition; motion is rejected until cleared.
    Alarm = 1,
    /// Stopped by M0/M1/M60; modal state preserved.
    ProgramStop = 2,
    /// Ended by M2/M30; modal state reset.
    ProgramEnd = 3,
    /// A machining cycle is active.
    Cycle = 4,
}

/// Cycle qualifier, meaningful while `MachineState::Cycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CycleState {
    /// No cycle active.
    #[default]
    Off = 0,
    /// Normal machining cycle.
    Started = 1,
    /// Homing cycle (driven by an external cycle state machine).
    Homing = 2,
    /// Probe cycle.
    Probe = 3,
    /// Jog cycle.
    Jog = 4,
}

/// Motion state within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MotionState {
    /// No motion in flight.
    #[default]
    Stop = 0,
    /// Segments are being generated and run.
    Run = 1,
    /// Feedhold in progress or holding.
    Hold = 2,
}

/// Feedhold sequencing state.
///
/// `Sync` asks the runtime to begin shedding velocity at the next segment
/// boundary; `DecelContinue` marks a deceleration that spans past the
/// running block into downstream blocks; `Hold` is reached at zero velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HoldState {
    /// No feedhold active.
    #[default]
    Off = 0,
    /// Requested; runtime has not yet planned the deceleration.
    Sync = 1,
    /// Decelerating; the ramp continues into following blocks.
    DecelContinue = 2,
    /// Decelerating within the running block.
    Decel = 3,
    /// At zero velocity, holding position.
    Hold = 4,
    /// Cycle start received; resuming from the hold point.
    EndHold = 5,
}

/// The single state value shown on the status-report surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CombinedState {
    Ready = 0,
    Alarm = 1,
    ProgramStop = 2,
    ProgramEnd = 3,
    Run = 4,
    Hold = 5,
    Homing = 6,
    Probe = 7,
    Jog = 8,
}

/// Project the raw states into the reported combined state.
///
/// Outside a cycle the machine state maps through directly. Within a cycle,
/// homing/probe/jog qualifiers win over the run/hold distinction.
pub fn combined_state(
    machine: MachineState,
    cycle: CycleState,
    motion: MotionState,
) -> CombinedState {
    if machine != MachineState::Cycle {
        return match machine {
            MachineState::Ready => CombinedState::Ready,
            MachineState::Alarm => CombinedState::Alarm,
            MachineState::ProgramStop => CombinedState::ProgramStop,
            MachineState::ProgramEnd => CombinedState::ProgramEnd,
            MachineState::Cycle => unreachable!(),
        };
    }
    match cycle {
        CycleState::Homing => CombinedState::Homing,
        CycleState::Probe => CombinedState::Probe,
        CycleState::Jog => CombinedState::Jog,
        CycleState::Off | CycleState::Started => match motion {
            MotionState::Hold => CombinedState::Hold,
            _ => CombinedState::Run,
        },
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_outside_cycle_maps_machine_state() {
        assert_eq!(
            combined_state(MachineState::Ready, CycleState::Off, MotionState::Stop),
            CombinedState::Ready
        );
        assert_eq!(
            combined_state(MachineState::Alarm, CycleState::Off, MotionState::Run),
            CombinedState::Alarm
        );
        assert_eq!(
            combined_state(MachineState::ProgramEnd, CycleState::Off, MotionState::Stop),
            CombinedState::ProgramEnd
        );
    }

    #[test]
    fn combined_in_cycle_tracks_motion() {
        assert_eq!(
            combined_state(MachineState::Cycle, CycleState::Started, MotionState::Run),
            CombinedState::Run
        );
        assert_eq!(
            combined_state(MachineState::Cycle, CycleState::Started, MotionState::Hold),
            CombinedState::Hold
        );
    }

    #[test]
    fn combined_cycle_qualifiers_win() {
        assert_eq!(
            combined_state(MachineState::Cycle, CycleState::Homing, MotionState::Run),
            CombinedState::Homing
        );
        assert_eq!(
            combined_state(MachineState::Cycle, CycleState::Probe, MotionState::Hold),
            CombinedState::Probe
        );
        assert_eq!(
            combined_state(MachineState::Cycle, CycleState::Jog, MotionState::Run),
            CombinedState::Jog
        );
    }
}
