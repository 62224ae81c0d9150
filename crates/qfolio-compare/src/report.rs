use qfolio_classical::FrontierPoint;
use qfolio_metrics::{Metric, MetricsSet};
use qfolio_types::{AssetId, ErrorKind, QfolioError, SolverKind, SolverResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error recorded as data instead of aborting the comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&QfolioError> for SolverFailure {
    fn from(err: &QfolioError) -> Self {
        SolverFailure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Conditions a reader should know about before trusting a solver's numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SolverFlags {
    pub failed: bool,
    pub infeasible: bool,
    pub timed_out: bool,
    pub cancelled: bool,
    /// Zero portfolio volatility; Sharpe is reported as 0
    pub degenerate: bool,
}

/// Outcome of one requested solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    pub solver: SolverKind,
    pub result: Option<SolverResult>,
    pub metrics: Option<MetricsSet>,
    /// Capital per asset (weight × budget)
    pub allocation: Option<BTreeMap<AssetId, f64>>,
    pub flags: SolverFlags,
    /// Fatal failure; `result` is absent
    pub error: Option<SolverFailure>,
    /// Non-fatal condition attached to a returned result
    pub warning: Option<SolverFailure>,
}

impl SolverReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }
}

/// Best solver for a single metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWinner {
    pub solver: SolverKind,
    pub value: f64,
}

/// Every requested solver's outcome plus how they rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub assets: Vec<AssetId>,
    /// One entry per requested solver, in request order
    pub solvers: Vec<SolverReport>,
    pub ranking_metric: Metric,
    /// Solvers with metrics, best first
    pub ranking: Vec<SolverKind>,
    pub winners: BTreeMap<Metric, MetricWinner>,
    pub frontier: Option<Vec<FrontierPoint>>,
}

impl ComparisonReport {
    pub fn get(&self, solver: SolverKind) -> Option<&SolverReport> {
        self.solvers.iter().find(|r| r.solver == solver)
    }

    pub fn best(&self) -> Option<SolverKind> {
        self.ranking.first().copied()
    }

    pub fn num_succeeded(&self) -> usize {
        self.solvers.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> Vec<SolverKind> {
        self.solvers
            .iter()
            .filter(|r| !r.succeeded())
            .map(|r| r.solver)
            .collect()
    }

    pub fn to_json(&self) -> qfolio_types::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
