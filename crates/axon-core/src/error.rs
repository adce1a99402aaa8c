//! Error types for axon-core.

use thiserror::Error;

use crate::params::{ParamLevel, SourceLocation};

/// Framework error taxonomy.
///
/// Construction-time variants (`DuplicateParameter`, `UnknownParameter`,
/// `ParameterRange`) are fatal to the offending device but may be collected
/// as netlist diagnostics by the caller. `EvaluationDomain` is iteration-time
/// and recoverable by damping or rejecting the Newton step.
/// `SparsityMismatch` is setup-time and always fatal: the sparsity pattern
/// used for matrix preallocation disagrees with what the device would write.
#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate parameter {name} declared at {level} level")]
    DuplicateParameter { name: String, level: ParamLevel },

    #[error("unknown parameter {name} at {location}")]
    UnknownParameter {
        name: String,
        location: SourceLocation,
    },

    #[error("parameter {name} out of range: {message}")]
    ParameterRange { name: String, message: String },

    #[error("evaluation left the differentiable domain: {0}")]
    EvaluationDomain(String),

    #[error("sparsity mismatch: {0}")]
    SparsityMismatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
