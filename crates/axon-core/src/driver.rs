//! The per-step evaluation driver.
//!
//! Owns the process-local device instances and walks them through the
//! lifecycle in the required order. `update_intermediate_vars` runs across
//! instances on a rayon thread pool (each instance touches only its own
//! cache); accumulation into the shared vectors/Jacobians happens afterwards,
//! serially and additively, so no cross-instance locking is needed.

use nalgebra::DVector;
use rayon::prelude::*;

use crate::dae::DenseDae;
use crate::device::{Configuration, Device};
use crate::error::{Error, Result};
use crate::lids::LocalIds;

/// Per-instance index assignment from the topology layer.
#[derive(Debug, Clone, Default)]
pub struct TopologyAssignment {
    /// Solution-vector positions of the external terminals.
    pub external: Vec<usize>,
    /// Solution-vector positions of internal unknowns.
    pub internal: Vec<usize>,
    /// State-vector positions of non-solution state slots.
    pub state: Vec<usize>,
}

/// Drives the device lifecycle for all instances owned by this process.
#[derive(Debug, Default)]
pub struct Evaluator {
    devices: Vec<Box<dyn Device>>,
    bound: bool,
    ic_applied: bool,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an instance; returns its slot index.
    pub fn add_device(&mut self, device: Box<dyn Device>) -> usize {
        self.devices.push(device);
        self.devices.len() - 1
    }

    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    pub fn device(&self, index: usize) -> &dyn Device {
        self.devices[index].as_ref()
    }

    /// Resolve every instance's parameters and temperature coefficients.
    pub fn resolve_params(&mut self, config: &Configuration) -> Result<()> {
        for device in &mut self.devices {
            device.process_params()?;
            device.update_temperature(config.temperature_c)?;
        }
        log::debug!(
            "resolved parameters for {} device(s) at {} C",
            self.devices.len(),
            config.temperature_c
        );
        Ok(())
    }

    /// Bind every instance's local indices and Jacobian offsets against the
    /// supplied assignments, in device order. Shape mismatches abort setup.
    pub fn bind_topology(
        &mut self,
        dae: &DenseDae,
        assignments: &[TopologyAssignment],
    ) -> Result<()> {
        if assignments.len() != self.devices.len() {
            return Err(Error::SparsityMismatch(format!(
                "{} topology assignment(s) supplied for {} device(s)",
                assignments.len(),
                self.devices.len()
            )));
        }
        for (device, assignment) in self.devices.iter_mut().zip(assignments) {
            device.register_lids(&assignment.internal, &assignment.external)?;
            device.register_state_lids(&assignment.state)?;

            let mut lids = LocalIds::new();
            lids.register(
                &assignment.internal,
                &assignment.external,
                device.num_internal_unknowns(),
                device.num_external_unknowns(),
            )?;
            let offsets = dae.resolve_offsets(&lids, &device.jacobian_stamp())?;
            device.register_jac_lids(offsets)?;
        }
        self.bound = true;
        log::debug!("bound topology for {} device(s)", self.devices.len());
        Ok(())
    }

    /// Every method that dereferences local indices requires a prior
    /// successful `bind_topology`; calling out of order is a setup error,
    /// never an index panic.
    fn require_bound(&self) -> Result<()> {
        if self.bound {
            Ok(())
        } else {
            Err(Error::SparsityMismatch(
                "topology is not bound; bind_topology must succeed first".to_string(),
            ))
        }
    }

    /// Let devices override initial conditions; honored on the first step
    /// only, later calls are no-ops.
    pub fn set_initial_conditions(&mut self, solution: &mut DVector<f64>) -> Result<()> {
        self.require_bound()?;
        if self.ic_applied {
            return Ok(());
        }
        for device in &mut self.devices {
            device.set_ic(solution.as_mut_slice())?;
        }
        self.ic_applied = true;
        Ok(())
    }

    /// Start a time step: commit the previous step's converged solution as
    /// the last-known-good primary state.
    pub fn begin_step(&mut self, converged: &DVector<f64>) -> Result<()> {
        self.require_bound()?;
        for device in &mut self.devices {
            device.update_primary_state(converged.as_slice())?;
        }
        Ok(())
    }

    /// One Newton iteration: recompute every instance's cached values and
    /// partials from the trial solution (in parallel), then accumulate into
    /// the global F/Q vectors and Jacobians.
    ///
    /// An `EvaluationDomain` failure from any instance is returned before
    /// anything is accumulated; committed state is untouched.
    pub fn load(&mut self, solution: &DVector<f64>, dae: &mut DenseDae) -> Result<()> {
        self.require_bound()?;
        let trial = solution.as_slice();
        self.devices
            .par_iter_mut()
            .try_for_each(|device| device.update_intermediate_vars(trial))?;

        dae.clear();
        for device in &self.devices {
            device.load_dae_f_vector(dae.f_loader());
            device.load_dae_q_vector(dae.q_loader());
            device.load_dae_dfdx(&mut dae.dfdx_loader());
            device.load_dae_dqdx(&mut dae.dqdx_loader());
        }
        Ok(())
    }

    /// Finish a converged step: persist secondary state for the predictor.
    pub fn complete_step(&mut self, converged: &DVector<f64>) -> Result<()> {
        self.require_bound()?;
        for device in &mut self.devices {
            device.update_secondary_state(converged.as_slice())?;
        }
        Ok(())
    }
}
