//! Reference device types for the Axon evaluation core.
//!
//! This crate provides:
//! - a passive membrane patch (two-terminal conductance plus capacitance),
//!   the minimal device exercising the F/Q split;
//! - an excitable-membrane neuron with Hodgkin-Huxley-style gating unknowns,
//!   exercising internal unknowns, state slots, guarded rate kinetics, and
//!   the full Jacobian stamp protocol.
//!
//! Device physics lives in equation bodies generic over the dual-mode
//! numeric type from `axon-autodiff`.

pub mod neuron;
pub mod patch;
pub mod rates;

pub use neuron::{neuron_factory, NeuronInstance, NeuronModel, NeuronParams};
pub use patch::{patch_factory, MembranePatch, PatchParams};
