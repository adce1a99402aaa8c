//! Excitable-membrane neuron device.
//!
//! A two-terminal membrane with three internal gating unknowns (n, m, h)
//! following first-order relaxation kinetics toward voltage-dependent steady
//! states. Per instance the DAE rows are:
//!
//! - KCL at the positive terminal:
//!   F = G*(V1-V2-VREST) + GK*n^4*(V1-V2-EK) + GNA*m^3*h*(V1-V2-ENA),
//!   Q = C*(V1-V2)
//! - KCL at the negative terminal: the negation of the first row
//! - one relaxation row per gate: F = ((alpha+beta)*x - alpha) * s, Q = x,
//!   where s is the temperature rate scale
//!
//! All equation bodies are generic over the dual-mode numeric type; the
//! derivative-carrying instantiation produces every Jacobian entry the stamp
//! declares.

use axon_autodiff::{Dual, Scalar};
use axon_core::{
    Device, DeviceFactory, DeviceKind, Error, JacOffsets, JacStamp, LocalIds, MatrixLoader,
    ModelId, ParamBlock, ParamLevel, ParamRegistry, Result, StampedValues, VectorLoader,
};

use crate::rates;

/// Local unknown ordering: V1, V2 external, then n, m, h internal.
const NUM_VARS: usize = 5;
const NUM_EXTERNAL: usize = 2;
const NUM_INTERNAL: usize = 3;
/// State slots: committed potassium and sodium currents.
const NUM_STATE: usize = 2;

const VAR_V1: usize = 0;
const VAR_V2: usize = 1;
const VAR_N: usize = 2;
const VAR_M: usize = 3;
const VAR_H: usize = 4;

/// Q10 temperature scaling of the gating kinetics.
const Q10: f64 = 3.0;
/// Nominal temperature of the rate constants (degrees C).
const TNOM_C: f64 = 6.3;

/// Resolved neuron parameters, shared by a model and copied per instance.
#[derive(Debug, Clone)]
pub struct NeuronParams {
    /// Membrane capacitance (F).
    pub c_mem: f64,
    /// Membrane leak conductance (S).
    pub g_mem: f64,
    /// Resting potential (V).
    pub v_rest: f64,
    /// Potassium reversal potential (V).
    pub e_k: f64,
    /// Potassium base conductance (S).
    pub g_k: f64,
    /// Sodium reversal potential (V).
    pub e_na: f64,
    /// Sodium base conductance (S).
    pub g_na: f64,
}

impl Default for NeuronParams {
    fn default() -> Self {
        Self {
            c_mem: 1e-6,
            g_mem: 0.3e-3,
            v_rest: -70e-3,
            e_k: -77e-3,
            g_k: 36e-3,
            e_na: 50e-3,
            g_na: 120e-3,
        }
    }
}

fn model_registry() -> ParamRegistry {
    let defaults = NeuronParams::default();
    let mut reg = ParamRegistry::new();
    let _ = reg
        .declare("C", defaults.c_mem, "F", ParamLevel::Model)
        .and_then(|r| r.declare("G", defaults.g_mem, "S", ParamLevel::Model))
        .and_then(|r| r.declare("VREST", defaults.v_rest, "V", ParamLevel::Model))
        .and_then(|r| r.declare("EK", defaults.e_k, "V", ParamLevel::Model))
        .and_then(|r| r.declare("GK", defaults.g_k, "S", ParamLevel::Model))
        .and_then(|r| r.declare("ENA", defaults.e_na, "V", ParamLevel::Model))
        .and_then(|r| r.declare("GNA", defaults.g_na, "S", ParamLevel::Model))
        // Instance-level overrides of the membrane geometry scaling.
        .and_then(|r| r.declare("C", defaults.c_mem, "F", ParamLevel::Instance))
        .and_then(|r| r.declare("G", defaults.g_mem, "S", ParamLevel::Instance));
    reg
}

fn check_ranges(p: &NeuronParams) -> Result<()> {
    let reg = model_registry();
    if p.c_mem <= 0.0 {
        let unit = reg.unit("C", ParamLevel::Model).unwrap_or("");
        return Err(Error::ParameterRange {
            name: "C".to_string(),
            message: format!("membrane capacitance {} {unit} must be positive", p.c_mem),
        });
    }
    for (name, value) in [("G", p.g_mem), ("GK", p.g_k), ("GNA", p.g_na)] {
        if value < 0.0 {
            let unit = reg.unit(name, ParamLevel::Model).unwrap_or("");
            return Err(Error::ParameterRange {
                name: name.to_string(),
                message: format!("conductance {value} {unit} must be non-negative"),
            });
        }
    }
    Ok(())
}

// Equation bodies, written once over the numeric capability.

fn kcl_f<S: Scalar>(v1: S, v2: S, n: S, m: S, h: S, p: &NeuronParams) -> S {
    let pow_n = Scalar::powi(n, 4);
    let pow_m = Scalar::powi(m, 3);
    (v1 - v2 - p.v_rest) * p.g_mem
        + pow_n * (v1 - v2 - p.e_k) * p.g_k
        + pow_m * h * (v1 - v2 - p.e_na) * p.g_na
}

fn kcl_q<S: Scalar>(v1: S, v2: S, p: &NeuronParams) -> S {
    (v1 - v2) * p.c_mem
}

fn gate_f<S: Scalar>(alpha: S, beta: S, x: S, rate_scale: f64) -> S {
    ((alpha + beta) * x - alpha) * rate_scale
}

fn gate_q<S: Scalar>(x: S) -> S {
    x
}

/// One neuron model: a unique parameter set shared by its instances.
#[derive(Debug)]
pub struct NeuronModel {
    name: String,
    block: ParamBlock,
    params: NeuronParams,
    given_c: bool,
    given_g: bool,
    resolved: bool,
}

impl NeuronModel {
    pub fn new(name: impl Into<String>, block: ParamBlock) -> Self {
        Self {
            name: name.into(),
            block,
            params: NeuronParams::default(),
            given_c: false,
            given_g: false,
            resolved: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve model-level defaults once; idempotent.
    pub fn process_params(&mut self) -> Result<()> {
        let resolved = model_registry().resolve(ParamLevel::Model, &self.block)?;
        let params = NeuronParams {
            c_mem: resolved.require("C")?,
            g_mem: resolved.require("G")?,
            v_rest: resolved.require("VREST")?,
            e_k: resolved.require("EK")?,
            g_k: resolved.require("GK")?,
            e_na: resolved.require("ENA")?,
            g_na: resolved.require("GNA")?,
        };
        check_ranges(&params)?;
        self.given_c = resolved.given("C");
        self.given_g = resolved.given("G");
        self.params = params;
        self.resolved = true;
        Ok(())
    }

    pub fn params(&self) -> &NeuronParams {
        &self.params
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Whether the membrane capacitance was explicitly supplied.
    pub fn capacitance_given(&self) -> bool {
        self.given_c
    }

    /// Whether the membrane conductance was explicitly supplied.
    pub fn conductance_given(&self) -> bool {
        self.given_g
    }
}

/// A single neuron occurrence in the circuit.
#[derive(Debug)]
pub struct NeuronInstance {
    name: String,
    /// Handle to the owning model in the circuit's model arena.
    model: ModelId,
    block: ParamBlock,
    p: NeuronParams,
    rate_scale: f64,

    lids: LocalIds,
    stamp: JacStamp,
    offsets: Option<JacOffsets>,

    // Caches filled by update_intermediate_vars; valid for the current trial
    // solution only.
    f_values: [f64; NUM_VARS],
    q_values: [f64; NUM_VARS],
    df: StampedValues,
    dq: StampedValues,

    // Last-known-good unknowns, committed at the start of each step.
    committed: [f64; NUM_VARS],

    // Secondary state persisted after convergence for the predictor.
    k_current: f64,
    na_current: f64,
}

impl NeuronInstance {
    /// Construct an instance bound to a resolved model. The model's parameter
    /// set is copied in; instance-level overrides are applied later by
    /// `process_params`.
    pub fn new(
        name: impl Into<String>,
        model_id: ModelId,
        model: &NeuronModel,
        block: ParamBlock,
    ) -> Self {
        Self::from_parts(name, model_id, model.params().clone(), block)
    }

    fn from_parts(
        name: impl Into<String>,
        model_id: ModelId,
        params: NeuronParams,
        block: ParamBlock,
    ) -> Self {
        let stamp = JacStamp::new(vec![
            vec![VAR_V1, VAR_V2, VAR_N, VAR_M, VAR_H],
            vec![VAR_V1, VAR_V2, VAR_N, VAR_M, VAR_H],
            vec![VAR_V1, VAR_N],
            vec![VAR_V1, VAR_M],
            vec![VAR_V1, VAR_H],
        ]);
        let df = StampedValues::zeros_like(&stamp);
        let dq = StampedValues::zeros_like(&stamp);
        Self {
            name: name.into(),
            model: model_id,
            block,
            p: params,
            rate_scale: 1.0,
            lids: LocalIds::new(),
            stamp,
            offsets: None,
            f_values: [0.0; NUM_VARS],
            q_values: [0.0; NUM_VARS],
            df,
            dq,
            committed: [0.0; NUM_VARS],
            k_current: 0.0,
            na_current: 0.0,
        }
    }

    pub fn model_id(&self) -> ModelId {
        self.model
    }

    /// Fast residual-only path: plain-scalar F values at local unknowns `x`.
    pub fn eval_f_plain(&self, x: &[f64; NUM_VARS]) -> [f64; NUM_VARS] {
        let (v1, v2, n, m, h) = (x[0], x[1], x[2], x[3], x[4]);
        let f1 = kcl_f(v1, v2, n, m, h, &self.p);
        [
            f1,
            -f1,
            gate_f(
                rates::alpha_n(v1),
                rates::beta_n(v1),
                n,
                self.rate_scale,
            ),
            gate_f(
                rates::alpha_m(v1),
                rates::beta_m(v1),
                m,
                self.rate_scale,
            ),
            gate_f(
                rates::alpha_h(v1),
                rates::beta_h(v1),
                h,
                self.rate_scale,
            ),
        ]
    }

    /// Plain-scalar Q values at local unknowns `x`.
    pub fn eval_q_plain(&self, x: &[f64; NUM_VARS]) -> [f64; NUM_VARS] {
        let q1 = kcl_q(x[0], x[1], &self.p);
        [q1, -q1, gate_q(x[2]), gate_q(x[3]), gate_q(x[4])]
    }

    /// Committed potassium current from the last converged step.
    pub fn potassium_current(&self) -> f64 {
        self.k_current
    }

    /// Committed sodium current from the last converged step.
    pub fn sodium_current(&self) -> f64 {
        self.na_current
    }

    pub fn committed_state(&self) -> &[f64; NUM_VARS] {
        &self.committed
    }

    fn local_solution(&self, solution: &[f64]) -> [f64; NUM_VARS] {
        let mut x = [0.0; NUM_VARS];
        for (local, slot) in x.iter_mut().enumerate() {
            *slot = solution[self.lids.unknown(local)];
        }
        x
    }
}

/// Factory bound to one resolved model, for registration under the model's
/// name. Instances built through it copy the model's parameter set; their own
/// overrides apply in `process_params`.
pub fn neuron_factory(model_id: ModelId, model: &NeuronModel) -> DeviceFactory {
    let params = model.params().clone();
    Box::new(move |_config, block| {
        Ok(Box::new(NeuronInstance::from_parts(
            "NEURON",
            model_id,
            params.clone(),
            block.clone(),
        )))
    })
}

impl Device for NeuronInstance {
    fn kind(&self) -> DeviceKind {
        DeviceKind {
            name: "NEURON",
            num_nodes: 2,
            model_required: true,
            linear: false,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn num_external_unknowns(&self) -> usize {
        NUM_EXTERNAL
    }

    fn num_internal_unknowns(&self) -> usize {
        NUM_INTERNAL
    }

    fn num_state_slots(&self) -> usize {
        NUM_STATE
    }

    /// Resolve instance-level overrides; unset values inherit from the model
    /// copy taken at construction.
    fn process_params(&mut self) -> Result<()> {
        let resolved = model_registry().resolve(ParamLevel::Instance, &self.block)?;
        if resolved.given("C") {
            self.p.c_mem = resolved.require("C")?;
        }
        if resolved.given("G") {
            self.p.g_mem = resolved.require("G")?;
        }
        check_ranges(&self.p)
    }

    fn update_temperature(&mut self, temp_c: f64) -> Result<()> {
        self.rate_scale = Q10.powf((temp_c - TNOM_C) / 10.0);
        Ok(())
    }

    fn register_lids(&mut self, internal: &[usize], external: &[usize]) -> Result<()> {
        self.lids
            .register(internal, external, NUM_INTERNAL, NUM_EXTERNAL)
    }

    fn register_state_lids(&mut self, state: &[usize]) -> Result<()> {
        self.lids.register_state(state, NUM_STATE)
    }

    fn jacobian_stamp(&self) -> JacStamp {
        self.stamp.clone()
    }

    fn register_jac_lids(&mut self, offsets: JacOffsets) -> Result<()> {
        self.stamp.check_offsets(&offsets)?;
        self.offsets = Some(offsets);
        Ok(())
    }

    /// Seed the gating unknowns at their steady state for the initial
    /// membrane voltage.
    fn set_ic(&mut self, solution: &mut [f64]) -> Result<()> {
        let v1 = solution[self.lids.unknown(VAR_V1)];
        rates::check_gate_domain(&self.name, v1)?;
        let gates = [
            rates::gate_steady_state(rates::alpha_n(v1), rates::beta_n(v1)),
            rates::gate_steady_state(rates::alpha_m(v1), rates::beta_m(v1)),
            rates::gate_steady_state(rates::alpha_h(v1), rates::beta_h(v1)),
        ];
        for (i, value) in gates.iter().enumerate() {
            solution[self.lids.unknown(VAR_N + i)] = *value;
        }
        Ok(())
    }

    fn update_primary_state(&mut self, solution: &[f64]) -> Result<()> {
        self.committed = self.local_solution(solution);
        Ok(())
    }

    fn update_intermediate_vars(&mut self, solution: &[f64]) -> Result<()> {
        let x = self.local_solution(solution);
        rates::check_gate_domain(&self.name, x[VAR_V1])?;

        let v1 = Dual::<NUM_VARS>::variable(x[VAR_V1], VAR_V1);
        let v2 = Dual::<NUM_VARS>::variable(x[VAR_V2], VAR_V2);
        let n = Dual::<NUM_VARS>::variable(x[VAR_N], VAR_N);
        let m = Dual::<NUM_VARS>::variable(x[VAR_M], VAR_M);
        let h = Dual::<NUM_VARS>::variable(x[VAR_H], VAR_H);

        let kf = kcl_f(v1, v2, n, m, h, &self.p);
        let kq = kcl_q(v1, v2, &self.p);
        let nf = gate_f(rates::alpha_n(v1), rates::beta_n(v1), n, self.rate_scale);
        let mf = gate_f(rates::alpha_m(v1), rates::beta_m(v1), m, self.rate_scale);
        let hf = gate_f(rates::alpha_h(v1), rates::beta_h(v1), h, self.rate_scale);
        let rows = [kf, -kf, nf, mf, hf];
        let q_rows = [kq, -kq, gate_q(n), gate_q(m), gate_q(h)];

        for row in 0..NUM_VARS {
            if !rows[row].val.is_finite() || !q_rows[row].val.is_finite() {
                return Err(Error::EvaluationDomain(format!(
                    "{}: non-finite equation value in row {row}",
                    self.name
                )));
            }
            self.f_values[row] = rows[row].val;
            self.q_values[row] = q_rows[row].val;
            for (k, &col) in self.stamp.row(row).iter().enumerate() {
                self.df.row_mut(row)[k] = rows[row].deriv(col);
                self.dq.row_mut(row)[k] = q_rows[row].deriv(col);
            }
        }
        Ok(())
    }

    fn update_secondary_state(&mut self, solution: &[f64]) -> Result<()> {
        let x = self.local_solution(solution);
        let vd = x[VAR_V1] - x[VAR_V2];
        self.k_current = self.p.g_k * x[VAR_N].powi(4) * (vd - self.p.e_k);
        self.na_current = self.p.g_na * x[VAR_M].powi(3) * x[VAR_H] * (vd - self.p.e_na);
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
