//! Passive membrane patch: a two-terminal conductance in parallel with a
//! capacitance.
//!
//! The simplest device in the closed set, and the reference for the F/Q
//! split: F = G*(V1 - V2) carries the resistive current, Q = C*(V1 - V2)
//! carries the charge whose time derivative the integrator forms. With C = 0
//! the device is purely algebraic under the same DAE formulation.

use axon_autodiff::{Dual, Scalar};
use axon_core::{
    Device, DeviceFactory, DeviceKind, Error, JacOffsets, JacStamp, LocalIds, MatrixLoader,
    ParamBlock, ParamLevel, ParamRegistry, Result, StampedValues, VectorLoader,
};

/// Local unknown ordering: V1, V2.
const NUM_VARS: usize = 2;

/// Patch parameters.
#[derive(Debug, Clone)]
pub struct PatchParams {
    /// Membrane conductance (S). Default: 1e-3.
    pub g: f64,
    /// Membrane capacitance (F). Default: 1e-6.
    pub c: f64,
}

impl Default for PatchParams {
    fn default() -> Self {
        Self { g: 1e-3, c: 1e-6 }
    }
}

fn registry() -> ParamRegistry {
    let mut reg = ParamRegistry::new();
    // Fixed names at one level; declarations cannot collide.
    let _ = reg
        .declare("G", 1e-3, "S", ParamLevel::Instance)
        .and_then(|r| r.declare("C", 1e-6, "F", ParamLevel::Instance));
    reg
}

fn patch_f<S: Scalar>(v1: S, v2: S, g: f64) -> S {
    (v1 - v2) * g
}

fn patch_q<S: Scalar>(v1: S, v2: S, c: f64) -> S {
    (v1 - v2) * c
}

/// A membrane patch instance.
#[derive(Debug)]
pub struct MembranePatch {
    name: String,
    block: ParamBlock,
    params: PatchParams,
    lids: LocalIds,
    stamp: JacStamp,
    offsets: Option<JacOffsets>,
    f_values: [f64; NUM_VARS],
    q_values: [f64; NUM_VARS],
    df: StampedValues,
    dq: StampedValues,
}

impl MembranePatch {
    pub fn new(name: impl Into<String>, block: ParamBlock) -> Self {
        // Both KCL rows depend on both terminal voltages.
        let stamp = JacStamp::new(vec![vec![0, 1], vec![0, 1]]);
        let df = StampedValues::zeros_like(&stamp);
        let dq = StampedValues::zeros_like(&stamp);
        Self {
            name: name.into(),
            block,
            params: PatchParams::default(),
            lids: LocalIds::new(),
            stamp,
            offsets: None,
            f_values: [0.0; NUM_VARS],
            q_values: [0.0; NUM_VARS],
            df,
            dq,
        }
    }

    pub fn params(&self) -> &PatchParams {
        &self.params
    }
}

/// Factory entry point for the topology layer.
pub fn patch_factory() -> DeviceFactory {
    Box::new(|_config, block| Ok(Box::new(MembranePatch::new("PATCH", block.clone()))))
}

impl Device for MembranePatch {
    fn kind(&self) -> DeviceKind {
        DeviceKind {
            name: "PATCH",
            num_nodes: 2,
            model_required: false,
            linear: true,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn num_external_unknowns(&self) -> usize {
        NUM_VARS
    }

    fn process_params(&mut self) -> Result<()> {
        let reg = registry();
        let resolved = reg.resolve(ParamLevel::Instance, &self.block)?;
        let g = resolved.require("G")?;
        let c = resolved.require("C")?;
        for (name, value) in [("G", g), ("C", c)] {
            if value < 0.0 {
                let unit = reg.unit(name, ParamLevel::Instance).unwrap_or("");
                return Err(Error::ParameterRange {
                    name: name.to_string(),
                    message: format!("value {value} {unit} must be non-negative"),
                });
            }
        }
        self.params = PatchParams { g, c };
        Ok(())
    }

    fn register_lids(&mut self, internal: &[usize], external: &[usize]) -> Result<()> {
        self.lids.register(internal, external, 0, NUM_VARS)
    }

    fn jacobian_stamp(&self) -> JacStamp {
        self.stamp.clone()
    }

    fn register_jac_lids(&mut self, offsets: JacOffsets) -> Result<()> {
        self.stamp.check_offsets(&offsets)?;
        self.offsets = Some(offsets);
        Ok(())
    }

    fn update_intermediate_vars(&mut self, solution: &[f64]) -> Result<()> {
        let v1 = Dual::<NUM_VARS>::variable(solution[self.lids.unknown(0)], 0);
        let v2 = Dual::<NUM_VARS>::variable(solution[self.lids.unknown(1)], 1);

        let f1 = patch_f(v1, v2, self.params.g);
        let q1 = patch_q(v1, v2, self.params.c);

        // Terminal symmetry: the second KCL row is the negation of the first.
        for (row, sign) in [(0, 1.0), (1, -1.0)] {
            self.f_values[row] = sign * f1.val;
            self.q_values[row] = sign * q1.val;
            for (k, &col) in self.stamp.row(row).iter().enumerate() {
                self.df.row_mut(row)[k] = sign * f1.deriv(col);
                self.dq.row_mut(row)[k] = sign * q1.deriv(col);
            }
        }
        Ok(())
    }

    fn load_dae_f_vector(&self, f: &mut dyn VectorLoader) {
        for row in 0..NUM_VARS {
            f.add(self.lids.unknown(row), self.f_values[row]);
        }
    }

    fn load_dae_q_vector(&self, q: &mut dyn VectorLoader) {
        for row in 0..NUM_VARS {
            q.add(self.lids.unknown(row), self.q_values[row]);
        }
    }

    fn load_dae_dfdx(&self, jac: &mut dyn MatrixLoader) {
        if let Some(offsets) = &self.offsets {
            for row in 0..self.stamp.num_rows() {
                for (k, &offset) in offsets.row(row).iter().enumerate() {
                    jac.add(offset, self.df.row(row)[k]);
                }
            }
        }
    }

    fn load_dae_dqdx(&self, jac: &mut dyn MatrixLoader) {
        if let Some(offsets) = &self.offsets {
            for row in 0..self.stamp.num_rows() {
                for (k, &offset) in offsets.row(row).iter().enumerate() {
                    jac.add(offset, self.dq.row(row)[k]);
                }
            }
        }
    }
}
