//! Helix HAL
//!
//! Hardware abstraction seam between the stepper runtime and the physical
//! (or simulated) drive electronics.
//!
//! - [`driver`] - the [`driver::StepDriver`] trait the DDA emits through
//! - [`sim`] - a recording simulation driver for tests and hosted runs

pub mod driver;
pub mod sim;

pub use driver::StepDriver;
pub use sim::SimDriver;
