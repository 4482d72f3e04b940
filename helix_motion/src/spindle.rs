//! Spindle PWM mapping.
//!
//! Speed maps linearly from the calibrated `[speed_lo, speed_hi]` band to
//! the `[phase_lo, phase_hi]` duty band of the active direction; requests
//! outside the band clamp to its edges. Off (and any unknown state) falls
//! back to the calibrated off phase.

use helix_common::config::SpindlePwm;
use helix_common::gcode::SpindleMode;

/// PWM duty cycle for the given spindle mode and speed [rpm].
pub fn spindle_duty(mode: SpindleMode, speed: f64, pwm: &SpindlePwm) -> f64 {
    let (speed_lo, speed_hi, phase_lo, phase_hi) = match mode {
        SpindleMode::Cw => (pwm.cw_speed_lo, pwm.cw_speed_hi, pwm.cw_phase_lo, pwm.cw_phase_hi),
        SpindleMode::Ccw => (
            pwm.ccw_speed_lo,
            pwm.ccw_speed_hi,
            pwm.ccw_phase_lo,
            pwm.ccw_phase_hi,
        ),
        SpindleMode::Off => return pwm.phase_off,
    };

    let clamped = speed.clamp(speed_lo, speed_hi);
    let normalized = (clamped - speed_lo) / (speed_hi - speed_lo);
    normalized * (phase_hi - phase_lo) + phase_lo
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use helix_common::config::MachineConfig;

    fn pwm() -> SpindlePwm {
        MachineConfig::default().spindle
    }

    #[test]
    fn off_returns_off_phase() {
        let pwm = pwm();
        assert_eq!(spindle_duty(SpindleMode::Off, 12_000.0, &pwm), pwm.phase_off);
    }

    #[test]
    fn speed_band_maps_linearly() {
        let pwm = pwm();
        let lo = spindle_duty(SpindleMode::Cw, pwm.cw_speed_lo, &pwm);
        let hi = spindle_duty(SpindleMode::Cw, pwm.cw_speed_hi, &pwm);
        let mid = spindle_duty(
            SpindleMode::Cw,
            (pwm.cw_speed_lo + pwm.cw_speed_hi) / 2.0,
            &pwm,
        );
        assert_eq!(lo, pwm.cw_phase_lo);
        assert_eq!(hi, pwm.cw_phase_hi);
        assert!((mid - (pwm.cw_phase_lo + pwm.cw_phase_hi) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_band_speeds_clamp() {
        let pwm = pwm();
        assert_eq!(
            spindle_duty(SpindleMode::Ccw, 0.0, &pwm),
            pwm.ccw_phase_lo
        );
        assert_eq!(
            spindle_duty(SpindleMode::Ccw, 1e9, &pwm),
            pwm.ccw_phase_hi
        );
    }
}
