//! Hodgkin-Huxley gating rate functions.
//!
//! Each rate is a smooth function of the membrane voltage, written once over
//! the [`Scalar`] capability so the same body yields plain values and
//! value+derivative pairs. Voltages arrive in volts; the classical rate
//! constants are stated in millivolts and 1/ms, hence the scale factors.
//!
//! The exponentials are guarded by [`check_gate_domain`], which the device
//! calls before evaluation: inputs that would overflow an exponential or land
//! on the removable singularity of `alpha_n`/`alpha_m` are rejected with
//! `EvaluationDomain` rather than clamped, so the Newton loop can damp the
//! step and retry.

use axon_autodiff::Scalar;
use axon_core::{Error, Result};

/// Largest exponential argument accepted before an evaluation is refused.
pub const EXP_ARG_LIMIT: f64 = 700.0;

/// Potassium activation rate (1/s).
pub fn alpha_n<S: Scalar>(v: S) -> S {
    let vs = v * 1000.0;
    ((vs + 45.7) * 0.02) / (S::constant(1.0) - (-(vs + 45.7) * 0.1).exp()) * 1000.0
}

/// Potassium deactivation rate (1/s).
pub fn beta_n<S: Scalar>(v: S) -> S {
    let vs = v * 1000.0;
    (-(vs + 55.7) * 0.0125).exp() * 0.25 * 1000.0
}

/// Sodium activation rate (1/s).
pub fn alpha_m<S: Scalar>(v: S) -> S {
    let vs = v * 1000.0;
    ((vs + 29.7) * 0.38) / (S::constant(1.0) - (-(vs + 29.7) * 0.1).exp()) * 1000.0
}

/// Sodium deactivation rate (1/s).
pub fn beta_m<S: Scalar>(v: S) -> S {
    let vs = v * 1000.0;
    (-(vs + 54.7) * 0.0556).exp() * 15.2 * 1000.0
}

/// Sodium inactivation rate (1/s).
pub fn alpha_h<S: Scalar>(v: S) -> S {
    let vs = v * 1000.0;
    (-(vs + 48.0) * 0.05).exp() * 0.266 * 1000.0
}

/// Sodium de-inactivation rate (1/s).
pub fn beta_h<S: Scalar>(v: S) -> S {
    let vs = v * 1000.0;
    S::constant(3.8 * 1000.0) / ((-(vs + 18.0) * 0.1).exp() + 1.0)
}

/// Steady-state value of a gate with the given rates.
pub fn gate_steady_state(alpha: f64, beta: f64) -> f64 {
    alpha / (alpha + beta)
}

/// Verify that `v` (volts) keeps every rate sub-expression inside its
/// differentiable domain.
///
/// Two failure modes exist: an exponential argument large enough to overflow,
/// and the vanishing denominator of `alpha_n`/`alpha_m` (a removable 0/0 the
/// library deliberately does not special-case).
pub fn check_gate_domain(device: &str, v: f64) -> Result<()> {
    let vs = 1000.0 * v;
    // 0.1 is the largest argument coefficient; 60 mV bounds the offsets.
    if 0.1 * (vs.abs() + 60.0) > EXP_ARG_LIMIT {
        return Err(Error::EvaluationDomain(format!(
            "{device}: membrane voltage {v} V overflows a rate exponential"
        )));
    }
    for (name, offset) in [("alpha_n", 45.7), ("alpha_m", 29.7)] {
        let den = 1.0 - (-0.1 * (vs + offset)).exp();
        if den.abs() < 1e-12 {
            return Err(Error::EvaluationDomain(format!(
                "{device}: membrane voltage {v} V hits the {name} singularity"
            )));
        }
    }
    Ok(())
}
