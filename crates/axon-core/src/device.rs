//! The device lifecycle contract and per-type static metadata.

use std::collections::HashMap;
use std::fmt;

use crate::dae::{MatrixLoader, VectorLoader};
use crate::error::Result;
use crate::params::ParamBlock;
use crate::stamp::{JacOffsets, JacStamp};

/// Static metadata a device type exposes so the topology and solver layers
/// can size global structures before any instance is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceKind {
    /// Device-type name (e.g. "NEURON").
    pub name: &'static str,
    /// Number of external terminals.
    pub num_nodes: usize,
    /// Whether a model statement is required.
    pub model_required: bool,
    /// Linear/nonlinear classification.
    pub linear: bool,
}

/// Simulator-wide settings handed to device factories.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Ambient temperature (degrees C).
    pub temperature_c: f64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self { temperature_c: 27.0 }
    }
}

/// Constructor for one device occurrence, closed over whatever model context
/// the type needs.
pub type DeviceFactory = Box<dyn Fn(&Configuration, &ParamBlock) -> Result<Box<dyn Device>> + Send + Sync>;

/// Factories keyed by the name instance statements reference: the device-type
/// name for model-free types, the model name for model-bound ones.
#[derive(Default)]
pub struct DeviceRegistry {
    factories: HashMap<String, DeviceFactory>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `key`, returning the factory it replaces, if
    /// any.
    pub fn register(&mut self, key: impl Into<String>, factory: DeviceFactory) -> Option<DeviceFactory> {
        self.factories.insert(key.into(), factory)
    }

    /// Factory registered under `key`.
    pub fn factory(&self, key: &str) -> Option<&DeviceFactory> {
        self.factories.get(key)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("DeviceRegistry").field("keys", &keys).finish()
    }
}

/// The lifecycle every device instance must honor.
///
/// Required call order: `process_params`, then `register_lids` /
/// `register_state_lids`, then `register_jac_lids` (re-entered only on
/// topology change). Per time step the driver calls `update_primary_state`
/// once, then per Newton iteration `update_intermediate_vars` followed by the
/// four `load_dae_*` calls; on convergence `update_secondary_state`.
/// `set_ic` may override initial conditions on the first step only.
///
/// Evaluation is embarrassingly parallel across instances: an instance reads
/// only the supplied solution slice and its own cache, and writes only its
/// own cache and its registered global positions.
pub trait Device: std::fmt::Debug + Send {
    /// Static device-type metadata.
    fn kind(&self) -> DeviceKind;

    /// Instance name from the netlist (e.g. "N1").
    fn name(&self) -> &str;

    /// Number of solution unknowns at external terminals.
    fn num_external_unknowns(&self) -> usize;

    /// Number of solution unknowns internal to the device (no terminal).
    fn num_internal_unknowns(&self) -> usize {
        0
    }

    /// Number of non-solution state-vector slots.
    fn num_state_slots(&self) -> usize {
        0
    }

    /// Resolve parameter defaults and check range constraints.
    fn process_params(&mut self) -> Result<()>;

    /// Re-resolve temperature-dependent coefficients. Must be idempotent and
    /// safe to call repeatedly within a step.
    fn update_temperature(&mut self, _temp_c: f64) -> Result<()> {
        Ok(())
    }

    /// Bind local unknowns to global solution-vector positions. Called
    /// exactly once per topology build.
    fn register_lids(&mut self, internal: &[usize], external: &[usize]) -> Result<()>;

    /// Bind purely-internal state slots to state-vector positions.
    fn register_state_lids(&mut self, _state: &[usize]) -> Result<()> {
        Ok(())
    }

    /// The fixed Jacobian sparsity pattern (possibly parameter-dependent,
    /// but stable for the instance's lifetime once registered).
    fn jacobian_stamp(&self) -> JacStamp;

    /// Receive the flat matrix offsets resolved for every stamp entry. The
    /// offsets' shape must exactly mirror `jacobian_stamp()`; a mismatch is
    /// fatal to device construction.
    fn register_jac_lids(&mut self, offsets: JacOffsets) -> Result<()>;

    /// Override initial conditions; invoked on the first step only.
    fn set_ic(&mut self, _solution: &mut [f64]) -> Result<()> {
        Ok(())
    }

    /// Commit the previous step's converged state. A rejected iteration's
    /// partial results must never leak into this state.
    fn update_primary_state(&mut self, _solution: &[f64]) -> Result<()> {
        Ok(())
    }

    /// Recompute all cached F/Q values and partial derivatives from the
    /// current trial solution. Returns `EvaluationDomain` when an input
    /// drives a sub-expression outside its differentiable domain, so the
    /// Newton loop can damp and retry.
    fn update_intermediate_vars(&mut self, solution: &[f64]) -> Result<()>;

    /// Persist whatever the next step's predictor needs, after convergence.
    fn update_secondary_state(&mut self, _solution: &[f64]) -> Result<()> {
        Ok(())
    }

    /// Accumulate cached F values at the registered solution indices.
    fn load_dae_f_vector(&self, f: &mut dyn VectorLoader);

    /// Accumulate cached Q values at the registered solution indices.
    fn load_dae_q_vector(&self, q: &mut dyn VectorLoader);

    /// Accumulate cached dF/dx partials at the registered offsets.
    fn load_dae_dfdx(&self, jac: &mut dyn MatrixLoader);

    /// Accumulate cached dQ/dx partials at the registered offsets.
    fn load_dae_dqdx(&self, jac: &mut dyn MatrixLoader);
}
