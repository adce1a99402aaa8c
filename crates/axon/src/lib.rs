//! # Axon
//!
//! The compact-device evaluation core of a parallel DAE circuit simulator.
//!
//! A device type contributes equations to the global system `dQ/dt + F = 0`
//! by implementing the [`Device`](axon_core::Device) lifecycle: parameter
//! resolution, local-index and Jacobian-stamp registration, then per-Newton-
//! iteration evaluation and additive loading of residual, charge, and exact
//! Jacobian entries (computed by forward-mode automatic differentiation).
//!
//! ```rust
//! use axon::prelude::*;
//!
//! let block = ParamBlock::new(SourceLocation::unknown()).with("G", 0.3);
//! let mut eval = Evaluator::new();
//! eval.add_device(Box::new(MembranePatch::new("P1", block)));
//! eval.resolve_params(&Configuration::default()).unwrap();
//! ```

// Re-export member crates
pub use axon_autodiff as autodiff;
pub use axon_core as core;
pub use axon_devices as devices;

/// Commonly used types.
pub mod prelude {
    pub use axon_autodiff::{Dual, Scalar};
    pub use axon_core::{
        Configuration, DenseDae, Device, DeviceFactory, DeviceKind, DeviceRegistry, Error,
        Evaluator, JacOffsets, JacStamp, LocalIds, ModelArena, ModelId, ParamBlock, ParamLevel,
        ParamRegistry, Result, SourceLocation, TopologyAssignment,
    };
    pub use axon_devices::{
        neuron_factory, patch_factory, MembranePatch, NeuronInstance, NeuronModel, NeuronParams,
        PatchParams,
    };
}
