use nalgebra::DVector;
use qfolio_risk::MomentsModel;
use qfolio_solver::{ClarabelSolver, QpStatus, SolverBackend};
use qfolio_types::{
    AssetId, Constraints, Diagnostics, QfolioError, Result, RunBudget, SolveStatus, SolverKind,
    SolverResult, WeightVector,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::qp_builder::QpBuilder;

/// Parameters for the classical solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassicalParams {
    /// Weights at or below this magnitude count as inactive
    pub active_tolerance: f64,
    /// Upper bound on QP re-solves during cardinality reduction
    pub max_qp_solves: usize,
}

impl Default for ClassicalParams {
    fn default() -> Self {
        ClassicalParams {
            active_tolerance: 1e-6,
            max_qp_solves: 1000,
        }
    }
}

/// Mean-variance QP solver with greedy cardinality reduction.
///
/// Without a binding cardinality limit the result is the global optimum of
/// the convex QP. When `max_assets` binds, the smallest active weight is
/// pinned to zero and the QP re-solved until few enough assets remain. This
/// greedy relaxation is an approximation of the NP-hard cardinality problem
/// and its result is reported as `Feasible`, never `Optimal`.
pub struct ClassicalSolver {
    backend: Arc<dyn SolverBackend + Send + Sync>,
    params: ClassicalParams,
}

impl ClassicalSolver {
    /// Create with the Clarabel backend
    pub fn new() -> Self {
        Self::with_params(ClassicalParams::default())
    }

    pub fn with_params(params: ClassicalParams) -> Self {
        ClassicalSolver {
            backend: Arc::new(ClarabelSolver::new()),
            params,
        }
    }

    /// Create with custom backend and parameters
    pub fn with_backend(backend: Arc<dyn SolverBackend + Send + Sync>, params: ClassicalParams) -> Self {
        ClassicalSolver { backend, params }
    }

    pub fn solve(
        &self,
        moments: &MomentsModel,
        constraints: &Constraints,
        budget: &RunBudget,
    ) -> Result<SolverResult> {
        let start = Instant::now();
        let n = moments.num_assets();
        let (lo, hi) = constraints.weight_bounds();
        let cap = constraints.max_weight_per_asset();
        let tol = self.params.active_tolerance;

        tracing::info!(
            assets = n,
            max_assets = constraints.max_assets(),
            risk_aversion = constraints.risk_aversion(),
            "classical solver started"
        );

        ensure_reachable(n, cap)?;

        let mut pinned = vec![false; n];
        let mut dropped: Vec<AssetId> = Vec::new();
        let mut qp_solves = 0;
        let mut iterations = 0;

        // Last optimal iterate, kept so an interrupted reduction can still answer
        let mut last: Option<Vec<f64>> = None;
        let mut stopped = None;

        let x = loop {
            if budget.exhausted() {
                let reason = if budget.is_cancelled() {
                    SolveStatus::Cancelled
                } else {
                    SolveStatus::TimedOut
                };
                match last.take() {
                    Some(x) => {
                        stopped = Some(reason);
                        break trim_to_cardinality(&x, &mut pinned, constraints.max_assets(), tol);
                    }
                    None => {
                        return Err(QfolioError::Cancelled(format!(
                            "classical solver stopped after {} QP solves",
                            qp_solves
                        )))
                    }
                }
            }
            if qp_solves >= self.params.max_qp_solves {
                return Err(QfolioError::SolverDivergence(format!(
                    "cardinality reduction did not finish within {} QP solves",
                    self.params.max_qp_solves
                )));
            }

            let model = QpBuilder::build(moments, constraints, &pinned)?;
            let solution = self.backend.solve_qp(&model)?;
            qp_solves += 1;
            iterations += solution.iterations;

            if solution.status != QpStatus::Optimal {
                return Err(QfolioError::SolverDivergence(format!(
                    "QP returned {:?} with {} assets pinned to zero",
                    solution.status,
                    dropped.len()
                )));
            }
            if solution.x.iter().any(|v| !v.is_finite()) {
                return Err(QfolioError::SolverDivergence(
                    "QP returned non-finite weights".to_string(),
                ));
            }

            let active: Vec<usize> = (0..n)
                .filter(|&i| !pinned[i] && solution.x[i].abs() > tol)
                .collect();

            if active.len() <= constraints.max_assets() {
                break solution.x;
            }

            // Smallest |w| goes first; ties broken by asset order
            let drop = active
                .iter()
                .copied()
                .min_by(|&a, &b| {
                    solution.x[a]
                        .abs()
                        .total_cmp(&solution.x[b].abs())
                        .then(a.cmp(&b))
                })
                .ok_or_else(|| QfolioError::Internal("empty active set".to_string()))?;

            pinned[drop] = true;
            dropped.push(moments.assets()[drop].clone());
            tracing::debug!(
                asset = %moments.assets()[drop],
                weight = solution.x[drop],
                active = active.len(),
                "dropping smallest weight"
            );

            ensure_reachable(n - dropped.len(), cap)?;
            last = Some(solution.x);
        };

        if stopped.is_some() {
            let trimmed: Vec<AssetId> = (0..n)
                .filter(|&i| pinned[i] && !dropped.contains(&moments.assets()[i]))
                .map(|i| moments.assets()[i].clone())
                .collect();
            tracing::warn!(
                qp_solves,
                trimmed = trimmed.len(),
                "classical solver interrupted; trimming last QP solution"
            );
            dropped.extend(trimmed);
        }

        let values = snap_weights(&x, &pinned, tol, lo, hi);
        let weights = WeightVector::new(moments.assets().to_vec(), values)?;
        let w = DVector::from_column_slice(weights.as_slice());

        let cardinality_heuristic = !dropped.is_empty();
        let status = match stopped {
            Some(reason) => reason,
            None if cardinality_heuristic => SolveStatus::Feasible,
            None => SolveStatus::Optimal,
        };
        let constraint_satisfaction = constraints.check(&weights);

        let result = SolverResult {
            solver: SolverKind::Classical,
            status,
            objective_value: moments.objective(&w, constraints.risk_aversion()),
            duration: start.elapsed(),
            infeasible: !constraint_satisfaction.all_satisfied(),
            constraint_satisfaction,
            diagnostics: Diagnostics::Classical {
                qp_solves,
                iterations,
                dropped_assets: dropped,
                cardinality_heuristic,
                qp_status: format!("{:?}", QpStatus::Optimal),
            },
            weights,
            budget: constraints.budget(),
        };

        tracing::info!(
            status = ?result.status,
            qp_solves,
            objective = result.objective_value,
            elapsed_ms = result.duration.as_secs_f64() * 1e3,
            "classical solver finished"
        );

        Ok(result)
    }
}

impl Default for ClassicalSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Solve with default parameters and no cancellation
pub fn solve_classical(moments: &MomentsModel, constraints: &Constraints) -> Result<SolverResult> {
    ClassicalSolver::new().solve(moments, constraints, &RunBudget::unlimited())
}

/// `count` assets capped at `cap` must be able to hold the whole budget
fn ensure_reachable(count: usize, cap: f64) -> Result<()> {
    if (count as f64) * cap < 1.0 - 1e-12 {
        return Err(QfolioError::SolverDivergence(format!(
            "{} assets capped at {} cannot be fully invested",
            count, cap
        )));
    }
    Ok(())
}

/// Keep the `keep` largest |w| of an interrupted iterate, pin the rest and
/// rescale the survivors to a full budget
fn trim_to_cardinality(x: &[f64], pinned: &mut [bool], keep: usize, tol: f64) -> Vec<f64> {
    let mut order: Vec<usize> = (0..x.len())
        .filter(|&i| !pinned[i] && x[i].abs() > tol)
        .collect();
    order.sort_by(|&a, &b| x[b].abs().total_cmp(&x[a].abs()).then(a.cmp(&b)));
    for &i in order.iter().skip(keep) {
        pinned[i] = true;
    }

    let total: f64 = order.iter().take(keep).map(|&i| x[i]).sum();
    let scale = if total.abs() > tol { 1.0 / total } else { 1.0 };
    x.iter()
        .zip(pinned.iter())
        .map(|(&w, &p)| if p { 0.0 } else { w * scale })
        .collect()
}

/// Zero out inactive weights, then hand the residual to the active asset with
/// the most room so that Σw = 1 holds without breaching a bound
fn snap_weights(x: &[f64], pinned: &[bool], tol: f64, lo: f64, hi: f64) -> Vec<f64> {
    let mut values: Vec<f64> = x
        .iter()
        .zip(pinned)
        .map(|(&w, &p)| if p || w.abs() <= tol { 0.0 } else { w.clamp(lo, hi) })
        .collect();

    let residual = 1.0 - values.iter().sum::<f64>();
    if residual.abs() > 0.0 {
        let room = |w: f64| if residual > 0.0 { hi - w } else { w - lo };
        let target = values
            .iter()
            .enumerate()
            .filter(|(_, w)| w.abs() > 0.0)
            .max_by(|(_, a), (_, b)| room(**a).total_cmp(&room(**b)))
            .map(|(i, _)| i);
        if let Some(i) = target {
            values[i] = (values[i] + residual).clamp(lo, hi);
        }
    }

    values
}

/// Largest violation of the KKT conditions of the box- and budget-constrained
/// mean-variance QP at `weights`: stationarity with a single budget
/// multiplier, complementary slackness on the bounds, and primal feasibility.
pub fn kkt_residual(moments: &MomentsModel, constraints: &Constraints, weights: &[f64]) -> f64 {
    let (lo, hi) = constraints.weight_bounds();
    let bound_tol = 1e-7;
    let w = DVector::from_column_slice(weights);

    // Gradient of the maximized objective
    let g = moments.mu() - moments.sigma() * &w * constraints.risk_aversion();

    let mut interior = Vec::new();
    let mut at_lower = Vec::new();
    let mut at_upper = Vec::new();
    for (i, &wi) in weights.iter().enumerate() {
        if wi <= lo + bound_tol {
            at_lower.push(g[i]);
        } else if wi >= hi - bound_tol {
            at_upper.push(g[i]);
        } else {
            interior.push(g[i]);
        }
    }

    let max_lower = at_lower.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min_upper = at_upper.iter().cloned().fold(f64::INFINITY, f64::min);
    let nu = if !interior.is_empty() {
        interior.iter().sum::<f64>() / interior.len() as f64
    } else if at_lower.is_empty() {
        min_upper
    } else if at_upper.is_empty() {
        max_lower
    } else {
        0.5 * (max_lower + min_upper)
    };

    let stationarity = interior.iter().map(|gi| (gi - nu).abs()).fold(0.0, f64::max);
    let lower_slack = at_lower.iter().map(|gi| (gi - nu).max(0.0)).fold(0.0, f64::max);
    let upper_slack = at_upper.iter().map(|gi| (nu - gi).max(0.0)).fold(0.0, f64::max);
    let budget = (weights.iter().sum::<f64>() - 1.0).abs();
    let bounds = weights
        .iter()
        .map(|&wi| (lo - wi).max(wi - hi).max(0.0))
        .fold(0.0, f64::max);

    stationarity
        .max(lower_slack)
        .max(upper_slack)
        .max(budget)
        .max(bounds)
}
