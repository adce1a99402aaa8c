//! Dual-mode numeric evaluation for Axon device equations.
//!
//! Device physics is written once, generically over the [`Scalar`] capability
//! trait, and instantiated twice:
//! - with plain `f64` for fast residual-only evaluation;
//! - with [`Dual<N>`] (a value carrying a fixed-size partial-derivative
//!   vector) for forward-mode automatic differentiation, yielding the residual
//!   and every requested partial derivative from the same equation body.
//!
//! Because both modes share one body, the Jacobian can never silently diverge
//! from the residual.

pub mod dual;
pub mod scalar;

pub use dual::Dual;
pub use scalar::Scalar;
