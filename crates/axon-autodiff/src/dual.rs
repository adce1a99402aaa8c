//! Forward-mode dual numbers with a fixed-size derivative vector.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::scalar::Scalar;

/// A value together with its partial derivatives with respect to `N` seed
/// variables, propagated through arithmetic.
///
/// `N` is the size of the seed set a device declares for one evaluation pass;
/// it equals the number of local unknowns the device's equations reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual<const N: usize> {
    /// Plain value.
    pub val: f64,
    /// Partial derivatives, one slot per seed variable.
    pub der: [f64; N],
}

impl<const N: usize> Dual<N> {
    /// A seed variable: value `val`, derivative one in slot `seed`.
    ///
    /// Panics if `seed` is out of range; seeding happens at setup time with
    /// indices the device itself declared, so a bad seed is a programming
    /// error, not an input condition.
    pub fn variable(val: f64, seed: usize) -> Self {
        assert!(seed < N, "seed index {seed} out of range for {N} seeds");
        let mut der = [0.0; N];
        der[seed] = 1.0;
        Self { val, der }
    }

    /// Partial derivative with respect to seed variable `seed`.
    pub fn deriv(&self, seed: usize) -> f64 {
        self.der[seed]
    }
}

impl<const N: usize> Add for Dual<N> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let mut der = self.der;
        for (d, r) in der.iter_mut().zip(rhs.der.iter()) {
            *d += r;
        }
        Self {
            val: self.val + rhs.val,
            der,
        }
    }
}

impl<const N: usize> Sub for Dual<N> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        let mut der = self.der;
        for (d, r) in der.iter_mut().zip(rhs.der.iter()) {
            *d -= r;
        }
        Self {
            val: self.val - rhs.val,
            der,
        }
    }
}

impl<const N: usize> Mul for Dual<N> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut der = [0.0; N];
        for (i, d) in der.iter_mut().enumerate() {
            *d = self.der[i] * rhs.val + self.val * rhs.der[i];
        }
        Self {
            val: self.val * rhs.val,
            der,
        }
    }
}

impl<const N: usize> Div for Dual<N> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.val;
        let val = self.val * inv;
        let mut der = [0.0; N];
        for (i, d) in der.iter_mut().enumerate() {
            *d = (self.der[i] - val * rhs.der[i]) * inv;
        }
        Self { val, der }
    }
}

impl<const N: usize> Neg for Dual<N> {
    type Output = Self;
    fn neg(self) -> Self {
        let mut der = self.der;
        for d in der.iter_mut() {
            *d = -*d;
        }
        Self {
            val: -self.val,
            der,
        }
    }
}

impl<const N: usize> Add<f64> for Dual<N> {
    type Output = Self;
    fn add(self, rhs: f64) -> Self {
        Self {
            val: self.val + rhs,
            der: self.der,
        }
    }
}

impl<const N: usize> Sub<f64> for Dual<N> {
    type Output = Self;
    fn sub(self, rhs: f64) -> Self {
        Self {
            val: self.val - rhs,
            der: self.der,
        }
    }
}

impl<const N: usize> Mul<f64> for Dual<N> {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        let mut der = self.der;
        for d in der.iter_mut() {
            *d *= rhs;
        }
        Self {
            val: self.val * rhs,
            der,
        }
    }
}

impl<const N: usize> Div<f64> for Dual<N> {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        let inv = 1.0 / rhs;
        let mut der = self.der;
        for d in der.iter_mut() {
            *d *= inv;
        }
        Self {
            val: self.val * inv,
            der,
        }
    }
}

impl<const N: usize> Scalar for Dual<N> {
    fn constant(value: f64) -> Self {
        Self {
            val: value,
            der: [0.0; N],
        }
    }

    fn value(&self) -> f64 {
        self.val
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        let mut der = self.der;
        for d in der.iter_mut() {
            *d *= e;
        }
        Self { val: e, der }
    }

    fn powi(self, n: i32) -> Self {
        let scale = f64::from(n) * self.val.powi(n - 1);
        let mut der = self.der;
        for d in der.iter_mut() {
            *d *= scale;
        }
        Self {
            val: self.val.powi(n),
            der,
        }
    }

    fn powf(self, e: f64) -> Self {
        let scale = e * self.val.powf(e - 1.0);
        let mut der = self.der;
        for d in der.iter_mut() {
            *d *= scale;
        }
        Self {
            val: self.val.powf(e),
            der,
        }
    }
}
