use nalgebra::DVector;
use qfolio_risk::MomentsModel;
use qfolio_types::{Constraints, RunBudget};
use serde::{Deserialize, Serialize};

use crate::classical::ClassicalSolver;

/// One point on the mean-variance efficient frontier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub risk_aversion: f64,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// Trace the frontier by re-solving the classical problem for `points`
/// risk-aversion values spaced logarithmically over [0.01, 100].
/// Values for which the solver fails are skipped.
pub fn efficient_frontier(
    moments: &MomentsModel,
    constraints: &Constraints,
    points: usize,
    risk_free_rate: f64,
) -> Vec<FrontierPoint> {
    let solver = ClassicalSolver::new();
    let budget = RunBudget::unlimited();

    let mut frontier = Vec::with_capacity(points);
    for lambda in logspace(-2.0, 2.0, points) {
        let point_constraints = match constraints.with_risk_aversion(lambda) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let result = match solver.solve(moments, &point_constraints, &budget) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(risk_aversion = lambda, error = %e, "frontier point skipped");
                continue;
            }
        };

        let w = DVector::from_column_slice(result.weights.as_slice());
        let expected_return = moments.expected_return(&w);
        let volatility = moments.variance(&w).max(0.0).sqrt();
        let sharpe_ratio = if volatility > 1e-12 {
            (expected_return - risk_free_rate) / volatility
        } else {
            0.0
        };

        frontier.push(FrontierPoint {
            risk_aversion: lambda,
            expected_return,
            volatility,
            sharpe_ratio,
        });
    }

    frontier
}

fn logspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![10f64.powf(start)],
        _ => (0..points)
            .map(|i| {
                let t = i as f64 / (points - 1) as f64;
                10f64.powf(start + t * (end - start))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::logspace;

    #[test]
    fn test_logspace_endpoints() {
        let values = logspace(-2.0, 2.0, 5);
        assert_eq!(values.len(), 5);
        assert!((values[0] - 0.01).abs() < 1e-12);
        assert!((values[2] - 1.0).abs() < 1e-12);
        assert!((values[4] - 100.0).abs() < 1e-9);
        assert!(logspace(-2.0, 2.0, 0).is_empty());
    }
}
