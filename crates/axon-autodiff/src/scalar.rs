//! The numeric capability trait shared by both evaluation modes.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Arithmetic capability required of a numeric type used in device equations.
///
/// Equation bodies are written against this trait only. Mixed operations with
/// `f64` are part of the contract so that physical constants can appear
/// directly in equation code.
pub trait Scalar:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    /// Lift a plain constant into the numeric type (derivative zero).
    fn constant(value: f64) -> Self;

    /// The plain value, discarding any derivative information.
    fn value(&self) -> f64;

    /// Natural exponential.
    fn exp(self) -> Self;

    /// Integer power.
    fn powi(self, n: i32) -> Self;

    /// Real power.
    fn powf(self, e: f64) -> Self;
}

impl Scalar for f64 {
    fn constant(value: f64) -> Self {
        value
    }

    fn value(&self) -> f64 {
        *self
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }

    fn powf(self, e: f64) -> Self {
        f64::powf(self, e)
    }
}
