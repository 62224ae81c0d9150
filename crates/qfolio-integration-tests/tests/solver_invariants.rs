use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use qfolio_classical::{kkt_residual, solve_classical};
use qfolio_compare::Comparator;
use qfolio_integration_tests::{asset_ids, quick_request, synthetic_prices};
use qfolio_metrics::compute_metrics;
use qfolio_qubo::{AnnealingParams, SimulatedAnnealer};
use qfolio_report::{MemoryReporter, Reporter};
use qfolio_risk::{compute_moments_annualized, MomentsModel};
use qfolio_types::{
    ConstraintConfig, ReturnKind, ReturnSeries, RunBudget, SolveStatus, SolverKind,
    WEIGHT_TOLERANCE,
};

/// Cardinality and per-asset caps hold for every unflagged solver answer
#[test]
fn test_cardinality_and_caps_hold_for_all_solvers() {
    let request = quick_request(
        SolverKind::all().to_vec(),
        ConstraintConfig {
            max_assets: Some(2),
            max_weight_per_asset: 0.6,
            discretization_levels: 6,
            ..Default::default()
        },
    );
    let report = Comparator::default()
        .run_request(&synthetic_prices(4, 120), &request, &RunBudget::unlimited())
        .unwrap();

    for entry in &report.solvers {
        let Some(result) = &entry.result else {
            println!("  {} failed: {:?}", entry.solver, entry.error);
            continue;
        };
        if entry.flags.infeasible {
            continue;
        }
        let w = &result.weights;
        assert!(w.active_count(WEIGHT_TOLERANCE) <= 2, "{}", entry.solver);
        assert!(w.max_abs() <= 0.6 + 1e-6, "{}", entry.solver);
        assert!((w.sum() - 1.0).abs() < 1e-6, "{}", entry.solver);
        assert!(w.as_slice().iter().all(|&v| v >= -1e-9), "{}", entry.solver);
    }
}

/// A fixed seed reproduces the annealer's answer exactly
#[test]
fn test_annealing_is_reproducible_with_seed() {
    let returns = ReturnSeries::from_prices(&synthetic_prices(3, 80), ReturnKind::Log).unwrap();
    let moments = compute_moments_annualized(&returns, 252.0).unwrap();
    let constraints = ConstraintConfig {
        discretization_levels: 5,
        ..Default::default()
    }
    .validate(3)
    .unwrap();

    let params = AnnealingParams {
        sweeps: 400,
        restarts: 6,
        seed: 99,
        ..Default::default()
    };
    let first = SimulatedAnnealer::new(params.clone())
        .solve(&moments, &constraints, &RunBudget::unlimited())
        .unwrap();
    let second = SimulatedAnnealer::new(params)
        .solve(&moments, &constraints, &RunBudget::unlimited())
        .unwrap();

    assert_eq!(first.weights, second.weights);
    assert_eq!(first.status, second.status);
    assert_eq!(first.objective_value, second.objective_value);
}

/// Metrics are a pure function of weights and returns
#[test]
fn test_metrics_are_idempotent() {
    let returns = ReturnSeries::from_prices(&synthetic_prices(3, 60), ReturnKind::Simple).unwrap();
    let moments = compute_moments_annualized(&returns, 252.0).unwrap();
    let constraints = ConstraintConfig::default().validate(3).unwrap();
    let result = solve_classical(&moments, &constraints).unwrap();

    let a = compute_metrics(&result.weights, &returns).unwrap();
    let b = compute_metrics(&result.weights, &returns).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

/// Rerunning the same experiment yields the same fingerprint despite new timings
#[test]
fn test_repeated_experiment_is_detected() {
    let request = quick_request(SolverKind::all().to_vec(), ConstraintConfig::default());
    let prices = synthetic_prices(3, 40);
    let inputs = serde_json::to_value(&request).unwrap();
    let reporter = MemoryReporter::new();

    let mut records = Vec::new();
    for _ in 0..2 {
        let report = Comparator::default()
            .run_request(&prices, &request, &RunBudget::unlimited())
            .unwrap();
        let outputs = report.to_json().unwrap();
        records.push(reporter.publish(reporter.next_job_id(), &inputs, &outputs).unwrap());
    }
    let (first, second) = (&records[0], &records[1]);

    assert_ne!(first.job_id, second.job_id);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(reporter.find_duplicate(&second.fingerprint), Some(first.job_id));
}

fn two_assets(mu: (f64, f64), vol: (f64, f64), corr: f64) -> MomentsModel {
    let cov = corr * vol.0 * vol.1;
    MomentsModel::new(
        asset_ids(2),
        DVector::from_vec(vec![mu.0, mu.1]),
        DMatrix::from_row_slice(2, 2, &[vol.0 * vol.0, cov, cov, vol.1 * vol.1]),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_two_asset_classical_satisfies_kkt(
        mu0 in 0.01f64..0.20,
        mu1 in 0.01f64..0.20,
        vol0 in 0.10f64..0.40,
        vol1 in 0.10f64..0.40,
        corr in -0.5f64..0.5,
        lambda in 0.5f64..5.0,
    ) {
        let moments = two_assets((mu0, mu1), (vol0, vol1), corr);
        let constraints = ConstraintConfig {
            risk_aversion: lambda,
            ..Default::default()
        }
        .validate(2)
        .unwrap();

        let result = solve_classical(&moments, &constraints).unwrap();
        prop_assert_eq!(result.status, SolveStatus::Optimal);
        prop_assert!((result.weights.sum() - 1.0).abs() < 1e-6);
        prop_assert!(kkt_residual(&moments, &constraints, result.weights.as_slice()) < 1e-4);
    }
}
