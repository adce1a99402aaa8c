//! End-to-end lifecycle tests: finite-difference consistency of the
//! derivative-carrying evaluation, stamp completeness, idempotence, state
//! isolation, and additive accumulation across instances.

use nalgebra::DVector;

use axon_core::{
    Configuration, DenseDae, Device, DeviceRegistry, Error, Evaluator, JacOffsets, JacStamp,
    LocalIds, ModelArena, ParamBlock, SourceLocation, TopologyAssignment,
};
use axon_devices::{neuron_factory, patch_factory, MembranePatch, NeuronInstance, NeuronModel};

fn empty_block() -> ParamBlock {
    ParamBlock::new(SourceLocation::unknown())
}

/// A neuron instance with identity local-to-global mapping into a
/// five-unknown system, fully registered against `dae`.
fn bound_neuron(dae: &DenseDae) -> NeuronInstance {
    let mut arena = ModelArena::new();
    let mut model = NeuronModel::new("HHMOD", empty_block());
    model.process_params().unwrap();
    let id = arena.insert(model);

    let mut inst = NeuronInstance::new("N1", id, arena.get(id), empty_block());
    inst.process_params().unwrap();
    inst.register_lids(&[2, 3, 4], &[0, 1]).unwrap();
    inst.register_state_lids(&[0, 1]).unwrap();

    let mut lids = LocalIds::new();
    lids.register(&[2, 3, 4], &[0, 1], 3, 2).unwrap();
    let offsets = dae.resolve_offsets(&lids, &inst.jacobian_stamp()).unwrap();
    inst.register_jac_lids(offsets).unwrap();
    inst
}

fn load_all(device: &dyn Device, dae: &mut DenseDae) {
    dae.clear();
    device.load_dae_f_vector(dae.f_loader());
    device.load_dae_q_vector(dae.q_loader());
    device.load_dae_dfdx(&mut dae.dfdx_loader());
    device.load_dae_dqdx(&mut dae.dqdx_loader());
}

#[test]
fn scenario_1_patch_values_and_partials() {
    let mut eval = Evaluator::new();
    let block = empty_block().with("G", 0.3).with("C", 1e-6);
    eval.add_device(Box::new(MembranePatch::new("P1", block)));

    let mut dae = DenseDae::new(2);
    eval.resolve_params(&Configuration::default()).unwrap();
    eval.bind_topology(
        &dae,
        &[TopologyAssignment {
            external: vec![0, 1],
            ..Default::default()
        }],
    )
    .unwrap();

    let solution = DVector::from_vec(vec![0.01, 0.0]);
    eval.begin_step(&solution).unwrap();
    eval.load(&solution, &mut dae).unwrap();

    assert!((dae.f[0] - 3e-3).abs() < 1e-15);
    assert!((dae.f[1] + 3e-3).abs() < 1e-15);
    assert!((dae.q[0] - 1e-8).abs() < 1e-20);
    assert!((dae.dfdx[(0, 0)] - 0.3).abs() < 1e-15);
    assert!((dae.dfdx[(0, 1)] + 0.3).abs() < 1e-15);
    assert!((dae.dqdx[(0, 0)] - 1e-6).abs() < 1e-18);
    assert!((dae.dqdx[(0, 1)] + 1e-6).abs() < 1e-18);
}

#[test]
fn scenario_2_gating_row_partials() {
    let mut dae = DenseDae::new(5);
    let mut inst = bound_neuron(&dae);

    let v1 = -0.03;
    let x = [v1, 0.0, 0.4, 0.2, 0.5];
    inst.update_intermediate_vars(&x).unwrap();
    load_all(&inst, &mut dae);

    // dF_n/dn is (alpha + beta) exactly, by construction.
    let rate_sum =
        axon_devices::rates::alpha_n(v1) + axon_devices::rates::beta_n(v1);
    assert!((dae.dfdx[(2, 2)] - rate_sum).abs() <= 1e-12 * rate_sum.abs());

    // dF_n/dV1 against a central finite difference of the plain evaluation.
    let eps = 1e-6;
    let mut xp = x;
    let mut xm = x;
    xp[0] += eps;
    xm[0] -= eps;
    let fd = (inst.eval_f_plain(&xp)[2] - inst.eval_f_plain(&xm)[2]) / (2.0 * eps);
    let ad = dae.dfdx[(2, 0)];
    assert!(
        (ad - fd).abs() <= 1e-6 * ad.abs().max(1.0),
        "ad = {ad}, fd = {fd}"
    );
}

#[test]
fn consistency_law_over_sampled_domain() {
    let mut dae = DenseDae::new(5);
    let mut inst = bound_neuron(&dae);
    let eps = 1e-6;

    let samples = [
        [-0.07, 0.0, 0.3, 0.05, 0.6],
        [-0.03, 0.01, 0.4, 0.2, 0.5],
        [0.02, -0.005, 0.7, 0.8, 0.1],
        [0.05, 0.0, 0.9, 0.95, 0.05],
    ];

    let stamp = inst.jacobian_stamp();
    for x in samples {
        inst.update_intermediate_vars(&x).unwrap();
        load_all(&inst, &mut dae);

        for (row, cols) in stamp.rows().iter().enumerate() {
            for &col in cols {
                let mut xp = x;
                let mut xm = x;
                xp[col] += eps;
                xm[col] -= eps;

                let fd_f =
                    (inst.eval_f_plain(&xp)[row] - inst.eval_f_plain(&xm)[row]) / (2.0 * eps);
                let ad_f = dae.dfdx[(row, col)];
                assert!(
                    (ad_f - fd_f).abs() <= 1e-6 * ad_f.abs().max(1.0),
                    "dF[{row}]/dx[{col}] at {x:?}: ad = {ad_f}, fd = {fd_f}"
                );

                let fd_q =
                    (inst.eval_q_plain(&xp)[row] - inst.eval_q_plain(&xm)[row]) / (2.0 * eps);
                let ad_q = dae.dqdx[(row, col)];
                assert!(
                    (ad_q - fd_q).abs() <= 1e-6 * ad_q.abs().max(1.0),
                    "dQ[{row}]/dx[{col}] at {x:?}: ad = {ad_q}, fd = {fd_q}"
                );
            }
        }
    }
}

#[test]
fn stamp_completeness_no_writes_outside_declared_entries() {
    let mut dae = DenseDae::new(5);
    let mut inst = bound_neuron(&dae);

    // Generic operating point with every conductance path active.
    inst.update_intermediate_vars(&[-0.02, 0.003, 0.37, 0.21, 0.55])
        .unwrap();
    load_all(&inst, &mut dae);

    let stamp = inst.jacobian_stamp();
    for i in 0..5 {
        for j in 0..5 {
            let wrote = dae.dfdx[(i, j)] != 0.0 || dae.dqdx[(i, j)] != 0.0;
            if wrote {
                assert!(
                    stamp.contains(i, j),
                    "nonzero at ({i}, {j}) outside the declared stamp"
                );
            }
        }
    }

    // Every declared entry received an offset (shape equality is what
    // register_jac_lids enforced at bind time).
    let mut lids = LocalIds::new();
    lids.register(&[2, 3, 4], &[0, 1], 3, 2).unwrap();
    let offsets = dae.resolve_offsets(&lids, &stamp).unwrap();
    for (row, cols) in stamp.rows().iter().enumerate() {
        assert_eq!(offsets.row(row).len(), cols.len());
    }
}

#[test]
fn idempotent_reevaluation() {
    let mut dae_a = DenseDae::new(5);
    let mut inst = bound_neuron(&dae_a);
    let x = [-0.04, 0.002, 0.33, 0.18, 0.62];

    inst.update_intermediate_vars(&x).unwrap();
    load_all(&inst, &mut dae_a);

    let mut dae_b = dae_a.clone();
    inst.update_intermediate_vars(&x).unwrap();
    load_all(&inst, &mut dae_b);

    assert_eq!(dae_a.f, dae_b.f);
    assert_eq!(dae_a.q, dae_b.q);
    assert_eq!(dae_a.dfdx, dae_b.dfdx);
    assert_eq!(dae_a.dqdx, dae_b.dqdx);
}

#[test]
fn state_isolation_between_instances() {
    // Two patches on disjoint nodes; re-evaluating A must not disturb B's
    // cached contributions.
    let mut dae = DenseDae::new(4);
    let mut a = MembranePatch::new("A", empty_block().with("G", 1.0));
    let mut b = MembranePatch::new("B", empty_block().with("G", 2.0));
    for (p, nodes) in [(&mut a, [0usize, 1]), (&mut b, [2, 3])] {
        p.process_params().unwrap();
        p.register_lids(&[], &nodes).unwrap();
        let mut lids = LocalIds::new();
        lids.register(&[], &nodes, 0, 2).unwrap();
        let offsets = dae.resolve_offsets(&lids, &p.jacobian_stamp()).unwrap();
        p.register_jac_lids(offsets).unwrap();
    }

    let base = [0.1, 0.0, 0.2, 0.0];
    a.update_intermediate_vars(&base).unwrap();
    b.update_intermediate_vars(&base).unwrap();

    dae.clear();
    b.load_dae_f_vector(dae.f_loader());
    let b_before = (dae.f[2], dae.f[3]);

    // Perturb A only; B's cache must be untouched.
    a.update_intermediate_vars(&[5.0, 0.0, 0.2, 0.0]).unwrap();

    dae.clear();
    b.load_dae_f_vector(dae.f_loader());
    assert_eq!((dae.f[2], dae.f[3]), b_before);
}

#[test]
fn scenario_3_offset_shape_mismatch_is_setup_fatal() {
    let stamp = JacStamp::new(vec![vec![0, 1], vec![0]]);
    let offsets = JacOffsets::new(vec![vec![0, 1], vec![0, 1]]);
    assert!(matches!(
        stamp.check_offsets(&offsets),
        Err(Error::SparsityMismatch(_))
    ));

    // The same mismatch through a device aborts registration before any
    // evaluation can occur.
    let dae = DenseDae::new(5);
    let mut inst = bound_neuron(&dae);
    let bad = JacOffsets::new(vec![vec![0]; 5]);
    assert!(matches!(
        inst.register_jac_lids(bad),
        Err(Error::SparsityMismatch(_))
    ));
}

#[test]
fn shared_node_contributions_accumulate() {
    let mut eval = Evaluator::new();

    let mut arena = ModelArena::new();
    let mut model = NeuronModel::new("HHMOD", empty_block());
    model.process_params().unwrap();
    let id = arena.insert(model);
    let neuron = NeuronInstance::new("N1", id, arena.get(id), empty_block());
    eval.add_device(Box::new(neuron));
    eval.add_device(Box::new(MembranePatch::new(
        "P1",
        empty_block().with("G", 0.5).with("C", 0.0),
    )));

    let mut dae = DenseDae::new(5);
    eval.resolve_params(&Configuration::default()).unwrap();
    eval.bind_topology(
        &dae,
        &[
            TopologyAssignment {
                external: vec![0, 1],
                internal: vec![2, 3, 4],
                state: vec![0, 1],
            },
            TopologyAssignment {
                external: vec![0, 1],
                ..Default::default()
            },
        ],
    )
    .unwrap();

    let x = [-0.02, 0.001, 0.4, 0.3, 0.5];
    let solution = DVector::from_vec(x.to_vec());
    eval.load(&solution, &mut dae).unwrap();

    // Node 0 carries the sum of the neuron KCL row and the patch current.
    let reference = bound_neuron(&DenseDae::new(5));
    let neuron_f = reference.eval_f_plain(&x)[0];
    let patch_f = 0.5 * (x[0] - x[1]);
    assert!((dae.f[0] - (neuron_f + patch_f)).abs() < 1e-12);
}

#[test]
fn registry_built_devices_run_the_full_lifecycle() {
    // Model-free types register under the device-type name; model-bound
    // types under the model name their instance statements reference.
    let mut registry = DeviceRegistry::new();
    registry.register("PATCH", patch_factory());

    let mut arena = ModelArena::new();
    let mut model = NeuronModel::new("HHMOD", empty_block());
    model.process_params().unwrap();
    let id = arena.insert(model);
    registry.register("HHMOD", neuron_factory(id, arena.get(id)));

    let config = Configuration::default();
    let mut eval = Evaluator::new();
    for (key, block) in [
        ("HHMOD", empty_block()),
        ("PATCH", empty_block().with("G", 0.5).with("C", 0.0)),
    ] {
        let make = registry.factory(key).unwrap();
        eval.add_device(make(&config, &block).unwrap());
    }

    let mut dae = DenseDae::new(5);
    eval.resolve_params(&config).unwrap();
    eval.bind_topology(
        &dae,
        &[
            TopologyAssignment {
                external: vec![0, 1],
                internal: vec![2, 3, 4],
                state: vec![0, 1],
            },
            TopologyAssignment {
                external: vec![0, 1],
                ..Default::default()
            },
        ],
    )
    .unwrap();

    let x = [-0.02, 0.001, 0.4, 0.3, 0.5];
    let solution = DVector::from_vec(x.to_vec());
    eval.load(&solution, &mut dae).unwrap();

    let reference = bound_neuron(&DenseDae::new(5));
    let neuron_f = reference.eval_f_plain(&x)[0];
    let patch_f = 0.5 * (x[0] - x[1]);
    assert!((dae.f[0] - (neuron_f + patch_f)).abs() < 1e-12);
}

#[test]
fn full_step_sequence_with_initial_conditions() {
    let mut eval = Evaluator::new();

    let mut arena = ModelArena::new();
    let mut model = NeuronModel::new("HHMOD", empty_block());
    model.process_params().unwrap();
    let id = arena.insert(model);
    eval.add_device(Box::new(NeuronInstance::new(
        "N1",
        id,
        arena.get(id),
        empty_block(),
    )));

    let mut dae = DenseDae::new(5);
    eval.resolve_params(&Configuration::default()).unwrap();
    eval.bind_topology(
        &dae,
        &[TopologyAssignment {
            external: vec![0, 1],
            internal: vec![2, 3, 4],
            state: vec![0, 1],
        }],
    )
    .unwrap();

    let mut solution = DVector::from_vec(vec![-0.065, 0.0, 0.0, 0.0, 0.0]);
    eval.set_initial_conditions(&mut solution).unwrap();
    // Gates seeded at steady state: strictly inside (0, 1).
    for i in 2..5 {
        assert!(solution[i] > 0.0 && solution[i] < 1.0);
    }

    eval.begin_step(&solution).unwrap();
    eval.load(&solution, &mut dae).unwrap();

    // Q row 0 is the membrane charge C*(V1 - V2).
    let c = axon_devices::NeuronParams::default().c_mem;
    assert!((dae.q[0] - c * solution[0]).abs() < 1e-18);

    eval.complete_step(&solution).unwrap();
}

#[test]
fn domain_error_surfaces_through_driver() {
    let mut eval = Evaluator::new();

    let mut arena = ModelArena::new();
    let mut model = NeuronModel::new("HHMOD", empty_block());
    model.process_params().unwrap();
    let id = arena.insert(model);
    eval.add_device(Box::new(NeuronInstance::new(
        "N1",
        id,
        arena.get(id),
        empty_block(),
    )));

    let mut dae = DenseDae::new(5);
    eval.resolve_params(&Configuration::default()).unwrap();
    eval.bind_topology(
        &dae,
        &[TopologyAssignment {
            external: vec![0, 1],
            internal: vec![2, 3, 4],
            state: vec![0, 1],
        }],
    )
    .unwrap();

    let solution = DVector::from_vec(vec![9000.0, 0.0, 0.4, 0.3, 0.5]);
    assert!(matches!(
        eval.load(&solution, &mut dae),
        Err(Error::EvaluationDomain(_))
    ));
}
