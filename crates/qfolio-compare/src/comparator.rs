use qfolio_classical::{efficient_frontier, ClassicalSolver};
use qfolio_metrics::{Metric, MetricsCalculator};
use qfolio_qubo::SimulatedAnnealer;
use qfolio_risk::{compute_moments_annualized, MomentsModel};
use qfolio_types::{
    Constraints, PriceRow, Result, ReturnSeries, RunBudget, SolveStatus, SolverKind, SolverResult,
};
use qfolio_variational::VariationalSolver;
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::report::{ComparisonReport, MetricWinner, SolverFailure, SolverFlags, SolverReport};
use crate::request::{OptimizationRequest, SolverParams};

/// Run a single solver family
pub fn run_solver(
    kind: SolverKind,
    moments: &MomentsModel,
    constraints: &Constraints,
    params: &SolverParams,
    budget: &RunBudget,
) -> Result<SolverResult> {
    match kind {
        SolverKind::Classical => ClassicalSolver::with_params(params.classical.clone())
            .solve(moments, constraints, budget),
        SolverKind::Qubo => SimulatedAnnealer::new(params.annealing.clone())
            .solve(moments, constraints, budget),
        SolverKind::Variational => VariationalSolver::new(params.variational.clone())
            .solve(moments, constraints, budget),
    }
}

/// Runs solvers side by side and ranks their portfolios
pub struct Comparator {
    config: EngineConfig,
    metrics: MetricsCalculator,
}

impl Comparator {
    pub fn new(config: EngineConfig) -> Self {
        let metrics = MetricsCalculator::new(config.metrics_config());
        Comparator { config, metrics }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a raw price table and request, then compare. Input errors
    /// are returned before any solver runs; solver errors end up in the
    /// report.
    pub fn run_request(
        &self,
        rows: &[PriceRow],
        request: &OptimizationRequest,
        budget: &RunBudget,
    ) -> Result<ComparisonReport> {
        self.config.validate()?;
        let kinds = request.solver_kinds()?;
        let returns = ReturnSeries::from_prices(rows, self.config.return_kind)?;
        let moments = compute_moments_annualized(&returns, self.config.annualization)?;
        let constraints = request.constraints.validate(returns.num_assets())?;
        let ranking = request.ranking_metric.unwrap_or(self.config.ranking_metric);

        tracing::info!(
            assets = returns.num_assets(),
            observations = returns.num_observations(),
            solvers = ?kinds,
            "request validated"
        );

        let mut report = self.compare(
            &moments,
            &returns,
            &constraints,
            &kinds,
            &request.resolved_params(),
            ranking,
            budget,
        );

        if self.config.frontier_points > 0 {
            report.frontier = Some(efficient_frontier(
                &moments,
                &constraints,
                self.config.frontier_points,
                self.config.risk_free_rate,
            ));
        }

        Ok(report)
    }

    /// Run `requested` independently on the rayon pool. Each run owns its
    /// output; moments and constraints are shared read-only.
    #[allow(clippy::too_many_arguments)]
    pub fn compare(
        &self,
        moments: &MomentsModel,
        returns: &ReturnSeries,
        constraints: &Constraints,
        requested: &[SolverKind],
        params: &SolverParams,
        ranking_metric: Metric,
        budget: &RunBudget,
    ) -> ComparisonReport {
        let solvers: Vec<SolverReport> = requested
            .par_iter()
            .map(|&kind| self.evaluate(kind, moments, returns, constraints, params, budget))
            .collect();

        let ranking = rank(&solvers, ranking_metric);
        let winners = winners(&solvers);

        if let Some(best) = ranking.first() {
            tracing::info!(metric = %ranking_metric, %best, "comparison ranked");
        }

        ComparisonReport {
            assets: moments.assets().to_vec(),
            solvers,
            ranking_metric,
            ranking,
            winners,
            frontier: None,
        }
    }

    fn evaluate(
        &self,
        kind: SolverKind,
        moments: &MomentsModel,
        returns: &ReturnSeries,
        constraints: &Constraints,
        params: &SolverParams,
        budget: &RunBudget,
    ) -> SolverReport {
        let result = match run_solver(kind, moments, constraints, params, budget) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(solver = %kind, error = %err, "solver failed");
                return SolverReport {
                    solver: kind,
                    result: None,
                    metrics: None,
                    allocation: None,
                    flags: SolverFlags {
                        failed: true,
                        cancelled: err.kind() == qfolio_types::ErrorKind::Cancelled,
                        ..Default::default()
                    },
                    error: Some(SolverFailure::from(&err)),
                    warning: None,
                };
            }
        };

        let (metrics, error) = match self.metrics.compute(&result.weights, returns) {
            Ok(m) => (Some(m), None),
            Err(err) => {
                tracing::warn!(solver = %kind, error = %err, "metrics failed");
                (None, Some(SolverFailure::from(&err)))
            }
        };

        let flags = SolverFlags {
            failed: false,
            infeasible: result.is_infeasible(),
            timed_out: result.status == SolveStatus::TimedOut,
            cancelled: result.status == SolveStatus::Cancelled,
            degenerate: metrics.as_ref().map_or(false, |m| m.zero_volatility),
        };
        let warning = result.warning().as_ref().map(SolverFailure::from);
        if let Some(w) = &warning {
            tracing::warn!(solver = %kind, warning = %w.message, "solver returned a degraded result");
        }

        SolverReport {
            solver: kind,
            allocation: Some(result.allocation()),
            result: Some(result),
            metrics,
            flags,
            error,
            warning,
        }
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Compare with the default engine configuration and solver tuning
pub fn compare(
    moments: &MomentsModel,
    returns: &ReturnSeries,
    constraints: &Constraints,
    requested: &[SolverKind],
) -> ComparisonReport {
    let comparator = Comparator::default();
    let metric = comparator.config.ranking_metric;
    comparator.compare(
        moments,
        returns,
        constraints,
        requested,
        &SolverParams::default(),
        metric,
        &RunBudget::unlimited(),
    )
}

/// Solvers with metrics, best first; ties keep solver order
fn rank(reports: &[SolverReport], metric: Metric) -> Vec<SolverKind> {
    let mut scored: Vec<(&SolverReport, &qfolio_metrics::MetricsSet)> = reports
        .iter()
        .filter_map(|r| r.metrics.as_ref().map(|m| (r, m)))
        .collect();
    scored.sort_by(|(ra, a), (rb, b)| metric.compare(a, b).then(ra.solver.cmp(&rb.solver)));
    scored.into_iter().map(|(r, _)| r.solver).collect()
}

fn winners(reports: &[SolverReport]) -> BTreeMap<Metric, MetricWinner> {
    let mut winners = BTreeMap::new();
    for &metric in Metric::all() {
        let best = reports
            .iter()
            .filter_map(|r| r.metrics.as_ref().map(|m| (r.solver, m)))
            .min_by(|(sa, a), (sb, b)| metric.compare(a, b).then(sa.cmp(sb)));
        if let Some((solver, m)) = best {
            winners.insert(
                metric,
                MetricWinner {
                    solver,
                    value: metric.value(m),
                },
            );
        }
    }
    winners
}
