//! Device-evaluation framework for the Axon parallel DAE simulator.
//!
//! This crate provides the contract by which a compact device contributes its
//! algebraic/differential equations to the global DAE system `dQ/dt + F = 0`:
//! - parameter declaration and resolution ([`params`])
//! - the Jacobian sparsity stamp and local-index protocol ([`stamp`], [`lids`])
//! - vector/matrix accumulation interfaces and a dense reference
//!   implementation ([`dae`])
//! - the per-step device lifecycle and its driver ([`device`], [`driver`])
//! - arena storage for shared device models ([`arena`])
//!
//! Netlist parsing, topology partitioning, time-step control, and the linear
//! solve are external collaborators consumed through the narrow traits here.

pub mod arena;
pub mod dae;
pub mod device;
pub mod driver;
pub mod error;
pub mod lids;
pub mod params;
pub mod stamp;

pub use arena::{ModelArena, ModelId};
pub use dae::{DenseDae, MatrixLoader, VectorLoader};
pub use device::{Configuration, Device, DeviceFactory, DeviceKind, DeviceRegistry};
pub use driver::{Evaluator, TopologyAssignment};
pub use error::{Error, Result};
pub use lids::LocalIds;
pub use params::{ParamBlock, ParamLevel, ParamRegistry, ResolvedParams, SourceLocation};
pub use stamp::{JacOffsets, JacStamp, StampedValues};
