//! Head/body/tail trapezoid solver.
//!
//! Sets section lengths and velocities for a block from the line length and
//! the requested entry/cruise/exit velocities. Lengths must stay accurate;
//! velocities may err on the slow side. The head and tail are S-curve ramps
//! under constant jerk, not literal triangles.
//!
//! Classes of fit, tested shortest first so pathological streams of tiny
//! blocks take the cheap exits:
//!
//! - **Single-segment / force fit** — the block runs in one segment; clamp
//!   the time, recompute cruise, degrade the exit by the velocity slew the
//!   jerk supports.
//! - **Body** — all three velocities already match within tolerance.
//! - **Head-only / tail-only** — too short for a ramp pair; degrade the
//!   exit if even the minimum ramp does not fit.
//! - **Rate-limited** — entry and exit are honored but the requested cruise
//!   is unreachable; symmetric case splits the length, asymmetric case
//!   iterates to a consistent cruise.
//! - **Requested fit** — full HBT with the residual body, absorbing a body
//!   shorter than the minimum into the ramps.
//!
//! Entry conditions: `length` non-zero (filtered upstream) and
//! `entry ≤ cruise ≥ exit`.

use helix_common::consts::{
    MIN_SEGMENT_TIME_PLUS_MARGIN, NOM_SEGMENT_TIME, TRAPEZOID_ITERATION_ERROR_PERCENT,
    TRAPEZOID_ITERATION_MAX,
};

use super::buffer::Block;
use super::fp_zero;

/// Adaptive velocity matching tolerance [mm/min].
#[inline]
fn velocity_tolerance(entry_velocity: f64) -> f64 {
    (entry_velocity / 100.0).max(2.0)
}

/// Minimum head length at the current velocities: two minimum segments.
#[inline]
fn min_head_length(bf: &Block) -> f64 {
    MIN_SEGMENT_TIME_PLUS_MARGIN * (bf.cruise_velocity + bf.entry_velocity)
}

/// Minimum tail length at the current velocities: two minimum segments.
#[inline]
fn min_tail_length(bf: &Block) -> f64 {
    MIN_SEGMENT_TIME_PLUS_MARGIN * (bf.cruise_velocity + bf.exit_velocity)
}

/// Minimum body length at the current cruise: one minimum segment.
#[inline]
fn min_body_length(bf: &Block) -> f64 {
    MIN_SEGMENT_TIME_PLUS_MARGIN * bf.cruise_velocity
}

/// Compute the trapezoid for `bf`, writing section lengths and adjusted
/// velocities back into the block.
pub fn calculate_trapezoid(bf: &mut Block) {
    // Single-segment and force-fit cases. Accept the entry velocity, limit
    // the cruise, and take the best exit the velocity slew supports. The
    // jerk value is violated here, but a single segment never integrates it.
    let mut naive_move_time = bf.length / bf.cruise_velocity;
    if naive_move_time <= NOM_SEGMENT_TIME {
        if naive_move_time < MIN_SEGMENT_TIME_PLUS_MARGIN {
            naive_move_time = MIN_SEGMENT_TIME_PLUS_MARGIN;
            bf.cruise_velocity = bf.length / naive_move_time;
        }
        bf.exit_velocity = (bf.entry_velocity - bf.delta_vmax)
            .min(bf.cruise_velocity)
            .max(0.0);
        bf.body_length = bf.length;
        bf.head_length = 0.0;
        bf.tail_length = 0.0;
        return;
    }

    // Body case: velocities all match, or close enough. Frequent in normal
    // G-code with runs of short collinear lines.
    let tolerance = velocity_tolerance(bf.entry_velocity);
    if (bf.cruise_velocity - bf.entry_velocity) < tolerance
        && (bf.cruise_velocity - bf.exit_velocity) < tolerance
    {
        bf.body_length = bf.length;
        bf.head_length = 0.0;
        bf.tail_length = 0.0;
        return;
    }

    // Head-only and tail-only short-line cases, including the degraded fits
    // where even the minimum ramp does not fit and the exit must give way.
    bf.body_length = 0.0;
    if bf.length <= min_head_length(bf) + min_body_length(bf) + min_tail_length(bf) {
        if bf.entry_velocity > bf.exit_velocity {
            // Tail-only (short deceleration).
            if bf.length < min_tail_length(bf) {
                bf.exit_velocity =
                    (bf.length / MIN_SEGMENT_TIME_PLUS_MARGIN - bf.entry_velocity).max(0.0);
            }
            bf.cruise_velocity = bf.entry_velocity;
            bf.tail_length = bf.length;
            bf.head_length = 0.0;
            return;
        }
        if bf.entry_velocity < bf.exit_velocity {
            // Head-only (short acceleration).
            if bf.length < min_head_length(bf) {
                bf.exit_velocity =
                    (bf.length / MIN_SEGMENT_TIME_PLUS_MARGIN - bf.entry_velocity).max(0.0);
            }
            bf.cruise_velocity = bf.exit_velocity;
            bf.head_length = bf.length;
            bf.tail_length = 0.0;
            return;
        }
    }

    // Set ramp lengths for evaluating the rate-limited cases.
    bf.head_length = target_length(bf.entry_velocity, bf.cruise_velocity, bf.recip_jerk);
    bf.tail_length = target_length(bf.exit_velocity, bf.cruise_velocity, bf.recip_jerk);
    if bf.head_length < min_head_length(bf) {
        bf.head_length = min_head_length(bf);
    }
    if bf.tail_length < min_tail_length(bf) {
        bf.tail_length = min_tail_length(bf);
    }

    if bf.length < bf.head_length + bf.tail_length {
        // Symmetric rate-limited case: split the length, compute the cruise.
        if (bf.entry_velocity - bf.exit_velocity).abs() < velocity_tolerance(bf.entry_velocity) {
            bf.head_length = bf.length / 2.0;
            bf.tail_length = bf.head_length;
            bf.cruise_velocity = bf
                .cruise_vmax
                .min(target_velocity(bf.entry_velocity, bf.head_length, bf.cbrt_jerk));

            if bf.head_length < min_head_length(bf) {
                // Too short even halved; convert to a body-only move at the
                // average of the entry and the computed best cruise.
                bf.body_length = bf.length;
                bf.head_length = 0.0;
                bf.tail_length = 0.0;
                bf.cruise_velocity = (bf.entry_velocity + bf.cruise_velocity) / 2.0;
                bf.entry_velocity = bf.cruise_velocity;
                bf.exit_velocity = bf.cruise_velocity;
            }
            return;
        }

        // Asymmetric rate-limited case. Successive approximation: split the
        // length by the current head:tail ratio and recompute the cruise
        // from the larger part until the change falls inside the tolerance.
        let mut computed_velocity = bf.cruise_vmax;
        let mut iterations = 0;
        loop {
            bf.cruise_velocity = computed_velocity;
            bf.head_length = target_length(bf.entry_velocity, bf.cruise_velocity, bf.recip_jerk);
            bf.tail_length = target_length(bf.exit_velocity, bf.cruise_velocity, bf.recip_jerk);
            if bf.head_length > bf.tail_length {
                bf.head_length =
                    (bf.head_length / (bf.head_length + bf.tail_length)) * bf.length;
                computed_velocity =
                    target_velocity(bf.entry_velocity, bf.head_length, bf.cbrt_jerk);
            } else {
                bf.tail_length =
                    (bf.tail_length / (bf.head_length + bf.tail_length)) * bf.length;
                computed_velocity =
                    target_velocity(bf.exit_velocity, bf.tail_length, bf.cbrt_jerk);
            }
            iterations += 1;
            let converged = ((bf.cruise_velocity - computed_velocity) / computed_velocity).abs()
                <= TRAPEZOID_ITERATION_ERROR_PERCENT;
            if converged || iterations >= TRAPEZOID_ITERATION_MAX {
                break;
            }
        }

        // Set the velocity and clean up any ramp that came out too short.
        bf.cruise_velocity = computed_velocity;
        bf.head_length = target_length(bf.entry_velocity, bf.cruise_velocity, bf.recip_jerk);
        bf.tail_length = bf.length - bf.head_length;
        if bf.head_length < min_head_length(bf) {
            bf.tail_length = bf.length; // all tail...
            bf.head_length = 0.0;
        }
        if bf.tail_length < min_tail_length(bf) {
            bf.head_length = bf.length; // ...or all head
            bf.tail_length = 0.0;
        }
        return;
    }

    // Requested-fit cases: the remaining HBT, HB, BT, H, T, B shapes.
    bf.body_length = bf.length - bf.head_length - bf.tail_length;

    // A non-zero body below minimum length is distributed to the ramps.
    // This costs small velocity errors at runtime but preserves distance,
    // which matters more.
    if bf.body_length < min_body_length(bf) && !fp_zero(bf.body_length) {
        if !fp_zero(bf.head_length) {
            if !fp_zero(bf.tail_length) {
                // HBT reduces to HT.
                bf.head_length += bf.body_length / 2.0;
                bf.tail_length += bf.body_length / 2.0;
            } else {
                // HB reduces to H.
                bf.head_length += bf.body_length;
            }
        } else {
            // BT reduces to T.
            bf.tail_length += bf.body_length;
        }
        bf.body_length = 0.0;
    } else if fp_zero(bf.head_length) && fp_zero(bf.tail_length) {
        // Standalone body: align the cruise to the entry, removing a
        // velocity discontinuity at the expense of top speed.
        bf.cruise_velocity = bf.entry_velocity;
    }
}

// ─── Closed-form constant-jerk kinematics ───────────────────────────
//
// With Jm the jerk, T the ramp time, Vi/Vt the endpoint velocities:
//   T = 2·sqrt(|Vt−Vi| / Jm)
//   L = T·(Vt+Vi)/2  →  L = (Vi+Vt)·sqrt(|Vt−Vi| / Jm)
// Solving L for Vt exactly is a cubic; the estimate below
// (Vt ≈ L^(2/3)·Jm^(1/3) + Vi) is accurate at planning lengths and errs on
// the slow side at short ones.

/// Ramp length needed to move between `vi` and `vt` at the block's jerk.
#[inline]
pub fn target_length(vi: f64, vt: f64, recip_jerk: f64) -> f64 {
    (vi + vt) * ((vt - vi).abs() * recip_jerk).sqrt()
}

/// Velocity reachable from `vi` over `length` at the block's jerk.
#[inline]
pub fn target_velocity(vi: f64, length: f64, cbrt_jerk: f64) -> f64 {
    length.powf(2.0 / 3.0) * cbrt_jerk + vi
}

/// Velocity required to cover `length` in `time` starting from `vi`.
#[inline]
pub fn target_velocity_given_time(vi: f64, length: f64, time: f64) -> f64 {
    (2.0 * length) / time + vi
}

// ─── Tests ──────────────────────────────────────────────────────────
