use qfolio_classical::ClassicalParams;
use qfolio_metrics::Metric;
use qfolio_qubo::AnnealingParams;
use qfolio_types::{ConstraintConfig, QfolioError, Result, SolverKind};
use qfolio_variational::VariationalParams;
use serde::{Deserialize, Serialize};

/// Tuning for each solver family
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub classical: ClassicalParams,
    pub annealing: AnnealingParams,
    pub variational: VariationalParams,
}

/// One optimization request from the API layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationRequest {
    pub solvers: Vec<SolverKind>,
    pub constraints: ConstraintConfig,
    #[serde(flatten)]
    pub params: SolverParams,
    pub ranking_metric: Option<Metric>,
    /// Overrides the annealing and variational seeds
    pub seed: Option<u64>,
    /// Wall-clock limit for the whole request
    pub time_limit_ms: Option<u64>,
}

impl Default for OptimizationRequest {
    fn default() -> Self {
        OptimizationRequest {
            solvers: SolverKind::all().to_vec(),
            constraints: ConstraintConfig::default(),
            params: SolverParams::default(),
            ranking_metric: None,
            seed: None,
            time_limit_ms: None,
        }
    }
}

impl OptimizationRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Requested kinds in first-seen order without repeats
    pub fn solver_kinds(&self) -> Result<Vec<SolverKind>> {
        let mut kinds = Vec::with_capacity(self.solvers.len());
        for kind in &self.solvers {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        if kinds.is_empty() {
            return Err(QfolioError::InvalidInput(
                "request names no solvers".to_string(),
            ));
        }
        Ok(kinds)
    }

    /// Solver parameters with the request-level seed applied
    pub fn resolved_params(&self) -> SolverParams {
        let mut params = self.params.clone();
        if let Some(seed) = self.seed {
            params.annealing.seed = seed;
            params.variational.seed = seed;
        }
        params
    }
}
