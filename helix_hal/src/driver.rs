//! The stepper drive interface.
//!
//! The DDA calls these methods from its highest-priority context, so
//! implementations must be non-blocking and allocation-free. Direction is
//! latched per segment, before the first step of that segment is emitted.

/// Per-motor step/direction/enable lines plus the spindle PWM channel.
pub trait StepDriver {
    /// Latch the direction line for `motor`. `reverse` follows the sign of
    /// the commanded steps after polarity compensation.
    fn set_direction(&mut self, motor: usize, reverse: bool);

    /// Emit one step pulse on `motor`.
    fn step(&mut self, motor: usize);

    /// Assert the enable line (energize the motor).
    fn enable(&mut self, motor: usize);

    /// Release the enable line (de-energize the motor).
    fn disable(&mut self, motor: usize);

    /// Set the spindle PWM duty cycle [0.0, 1.0].
    fn set_spindle_duty(&mut self, duty: f64);
}
