//! Shared fixtures for the end-to-end tests.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use qfolio_compare::OptimizationRequest;
use qfolio_risk::MomentsModel;
use qfolio_types::{AssetId, ConstraintConfig, PriceRow, SolverKind};

pub fn asset_ids(n: usize) -> Vec<AssetId> {
    (0..n).map(|i| AssetId::new(format!("A{}", i))).collect()
}

/// Deterministic price paths with distinct drift and a sinusoidal shock
/// per asset, `days` rows each.
pub fn synthetic_prices(assets: usize, days: usize) -> Vec<PriceRow> {
    let start = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
    let mut rows = Vec::with_capacity(assets * days);
    for i in 0..assets {
        let mut log_price = (50.0 + 10.0 * i as f64).ln();
        for t in 0..days {
            if t > 0 {
                let phase = t as f64 * (0.9 + 0.4 * i as f64) + 1.3 * i as f64;
                log_price += 0.0005 * (i as f64 + 1.0) + 0.012 * phase.sin();
            }
            rows.push(PriceRow::new(
                format!("A{}", i),
                start + chrono::Duration::days(t as i64),
                log_price.exp(),
            ));
        }
    }
    rows
}

/// Equal expected returns, identical variances, no covariance
pub fn symmetric_moments(n: usize) -> MomentsModel {
    MomentsModel::new(
        asset_ids(n),
        DVector::from_element(n, 0.08),
        DMatrix::from_diagonal_element(n, n, 0.04),
    )
    .unwrap()
}

/// A request small enough for the stochastic solvers to finish quickly
pub fn quick_request(solvers: Vec<SolverKind>, constraints: ConstraintConfig) -> OptimizationRequest {
    let mut request = OptimizationRequest {
        solvers,
        constraints,
        seed: Some(11),
        ..Default::default()
    };
    request.params.annealing.sweeps = 300;
    request.params.annealing.restarts = 8;
    request.params.variational.shots = 64;
    request.params.variational.max_iterations = 10;
    request
}
