use qfolio_classical::solve_classical;
use qfolio_compare::Comparator;
use qfolio_dataset::{DatasetSource, MemoryDataset};
use qfolio_integration_tests::{quick_request, symmetric_moments, synthetic_prices};
use qfolio_qubo::{PenaltyConfig, QuboModel};
use qfolio_risk::compute_moments_annualized;
use qfolio_types::{
    ConstraintConfig, Diagnostics, ErrorKind, ReturnKind, RunBudget, SolveStatus, SolverKind,
    WEIGHT_TOLERANCE,
};
use qfolio_variational::{sample_batch, VariationalAnsatz, VariationalParams, VariationalSolver};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Identical, uncorrelated assets share the budget equally
#[test]
fn test_symmetric_assets_split_evenly() {
    let moments = symmetric_moments(3);
    let constraints = ConstraintConfig {
        max_assets: Some(3),
        ..Default::default()
    }
    .validate(3)
    .unwrap();

    let result = solve_classical(&moments, &constraints).unwrap();

    assert_eq!(result.status, SolveStatus::Optimal);
    for (asset, w) in result.weights.iter() {
        println!("  {}: {:.6}", asset, w);
        assert!((w - 1.0 / 3.0).abs() < 1e-4, "{} got {}", asset, w);
    }
    assert!((result.weights.sum() - 1.0).abs() < 1e-6);
}

/// With a single-asset limit every solver either concentrates the whole
/// budget in one asset or flags its answer
#[test]
fn test_single_asset_limit_across_solvers() {
    let request = quick_request(
        SolverKind::all().to_vec(),
        ConstraintConfig {
            max_assets: Some(1),
            discretization_levels: 5,
            ..Default::default()
        },
    );
    let report = Comparator::default()
        .run_request(&synthetic_prices(3, 90), &request, &RunBudget::unlimited())
        .unwrap();

    assert_eq!(report.solvers.len(), 3);
    let classical = report.get(SolverKind::Classical).unwrap();
    assert!(classical.succeeded());
    assert!(!classical.flags.infeasible);

    for entry in &report.solvers {
        if entry.flags.failed || entry.flags.infeasible {
            println!("  {} flagged: {:?}", entry.solver, entry.flags);
            continue;
        }
        let weights = &entry.result.as_ref().unwrap().weights;
        assert_eq!(weights.active_count(WEIGHT_TOLERANCE), 1, "{}", entry.solver);
        assert!((weights.max_abs() - 1.0).abs() < 1e-6, "{}", entry.solver);
    }
}

/// A single date yields no returns; the request fails before any solver runs
#[test]
fn test_single_date_is_insufficient() {
    let request = quick_request(SolverKind::all().to_vec(), ConstraintConfig::default());
    let err = Comparator::default()
        .run_request(&synthetic_prices(3, 1), &request, &RunBudget::unlimited())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);

    let store = MemoryDataset::with_rows("one-day", synthetic_prices(3, 1));
    let err = store
        .return_series("one-day", &[], ReturnKind::Log)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);
}

/// Two dates give a return series but only one observation, too few for a
/// covariance estimate; three dates are enough
#[test]
fn test_moments_need_two_observations() {
    let store = MemoryDataset::with_rows("two-day", synthetic_prices(2, 2));
    let returns = store.return_series("two-day", &[], ReturnKind::Simple).unwrap();
    assert_eq!(returns.num_observations(), 1);
    let err = compute_moments_annualized(&returns, 252.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);

    let store = MemoryDataset::with_rows("three-day", synthetic_prices(2, 3));
    let returns = store.return_series("three-day", &[], ReturnKind::Simple).unwrap();
    let moments = compute_moments_annualized(&returns, 252.0).unwrap();
    assert_eq!(moments.observations(), 2);
    assert_eq!(moments.num_assets(), 2);
}

/// Without layers the sampler draws uniform bit strings; its expected energy
/// must not beat an independent uniform baseline
#[test]
fn test_zero_layer_sampler_matches_uniform_baseline() {
    let moments = symmetric_moments(3);
    let constraints = ConstraintConfig {
        discretization_levels: 5,
        ..Default::default()
    }
    .validate(3)
    .unwrap();
    let model = QuboModel::build(&moments, &constraints, &PenaltyConfig::default()).unwrap();

    // Independent uniform baseline
    let draws = 4000;
    let mut rng = StdRng::seed_from_u64(2024);
    let energies: Vec<f64> = (0..draws)
        .map(|_| {
            let x: Vec<bool> = (0..model.num_variables()).map(|_| rng.gen_bool(0.5)).collect();
            model.energy(&x)
        })
        .collect();
    let mean = energies.iter().sum::<f64>() / draws as f64;
    let var = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / (draws - 1) as f64;
    let baseline_se = (var / draws as f64).sqrt();

    let shots = 2000;
    let ansatz = VariationalAnsatz::new(&model, 0, model.penalties().one_hot);
    let batch = sample_batch(&ansatz, &[], shots, 7);
    let tolerance = 4.0 * (baseline_se.powi(2) + batch.std_error.powi(2)).sqrt();
    println!(
        "baseline {:.4} ± {:.4}, zero-layer batch {:.4} ± {:.4}",
        mean, baseline_se, batch.mean_energy, batch.std_error
    );
    assert!(batch.mean_energy >= mean - tolerance);

    let untrained = VariationalSolver::new(VariationalParams {
        layers: 0,
        shots,
        seed: 7,
        ..Default::default()
    })
    .solve(&moments, &constraints, &RunBudget::unlimited())
    .unwrap();
    let history = match &untrained.diagnostics {
        Diagnostics::Variational { energy_history, .. } => energy_history.clone(),
        other => panic!("unexpected diagnostics {:?}", other),
    };
    assert_eq!(history.len(), 1);
    assert!(history[0] >= mean - tolerance);

    // A trained ansatz has to do strictly better than chance
    let trained = VariationalSolver::new(VariationalParams {
        layers: 2,
        shots: 256,
        max_iterations: 30,
        seed: 7,
        ..Default::default()
    })
    .solve(&moments, &constraints, &RunBudget::unlimited())
    .unwrap();
    match &trained.diagnostics {
        Diagnostics::Variational {
            best_energy,
            energy_history,
            ..
        } => {
            assert!(*best_energy < mean);
            assert!(energy_history.iter().cloned().fold(f64::INFINITY, f64::min) < mean);
        }
        other => panic!("unexpected diagnostics {:?}", other),
    }
}
