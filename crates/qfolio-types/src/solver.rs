use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::asset::AssetId;
use crate::error::QfolioError;
use crate::weights::WeightVector;

/// The three solver families under comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    Classical,
    Qubo,
    Variational,
}

impl SolverKind {
    pub fn all() -> &'static [SolverKind] {
        &[SolverKind::Classical, SolverKind::Qubo, SolverKind::Variational]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Classical => "classical",
            SolverKind::Qubo => "qubo",
            SolverKind::Variational => "variational",
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SolverKind {
    type Err = QfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classical" => Ok(SolverKind::Classical),
            "qubo" | "annealing" => Ok(SolverKind::Qubo),
            "variational" | "qaoa" => Ok(SolverKind::Variational),
            other => Err(QfolioError::InvalidInput(format!(
                "unknown solver family: {}",
                other
            ))),
        }
    }
}

/// Outcome quality of a single solver run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Global optimum of the convex problem
    Optimal,
    /// Valid solution without an optimality guarantee
    Feasible,
    /// Best effort that violates the encoding or weight constraints
    Infeasible,
    /// Iteration/time budget spent before convergence; best found is returned
    TimedOut,
    /// Cancelled cooperatively; best found so far is returned
    Cancelled,
}

/// Which constraints a returned weight vector satisfies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSatisfaction {
    pub budget: bool,
    pub max_weight: bool,
    pub cardinality: bool,
    /// Only checked when short selling is disallowed
    pub non_negative: Option<bool>,
}

impl ConstraintSatisfaction {
    pub fn all_satisfied(&self) -> bool {
        self.budget && self.max_weight && self.cardinality && self.non_negative.unwrap_or(true)
    }
}

/// Solver-specific diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "solver", rename_all = "snake_case")]
pub enum Diagnostics {
    Classical {
        qp_solves: usize,
        iterations: usize,
        /// Assets removed by greedy cardinality reduction, in drop order
        dropped_assets: Vec<AssetId>,
        cardinality_heuristic: bool,
        qp_status: String,
    },
    Qubo {
        num_variables: usize,
        penalties: BTreeMap<String, f64>,
        best_energy: f64,
        restarts: usize,
        sweeps_per_restart: usize,
        restart_energies: Vec<f64>,
        one_hot_violations: usize,
    },
    Variational {
        layers: usize,
        num_parameters: usize,
        shots: usize,
        iterations: usize,
        converged: bool,
        best_energy: f64,
        final_parameters: Vec<f64>,
        energy_history: Vec<f64>,
        one_hot_violations: usize,
    },
}

impl Diagnostics {
    pub fn iterations(&self) -> usize {
        match self {
            Diagnostics::Classical { iterations, .. } => *iterations,
            Diagnostics::Qubo {
                restarts,
                sweeps_per_restart,
                ..
            } => restarts * sweeps_per_restart,
            Diagnostics::Variational { iterations, .. } => *iterations,
        }
    }
}

/// Immutable output of one solver run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    pub solver: SolverKind,
    pub status: SolveStatus,
    pub weights: WeightVector,
    /// μᵀw − (λ/2) wᵀΣw evaluated at the returned weights
    pub objective_value: f64,
    pub duration: Duration,
    pub diagnostics: Diagnostics,
    pub constraint_satisfaction: ConstraintSatisfaction,
    /// The returned weights came from an assignment that broke the encoding
    /// or could not be repaired onto the constraint set. Independent of
    /// `status`, which records why the run stopped.
    #[serde(default)]
    pub infeasible: bool,
    pub budget: f64,
}

impl SolverResult {
    pub fn is_infeasible(&self) -> bool {
        self.infeasible
            || self.status == SolveStatus::Infeasible
            || !self.constraint_satisfaction.all_satisfied()
    }

    /// Capital per asset (weight × budget)
    pub fn allocation(&self) -> BTreeMap<AssetId, f64> {
        self.weights.allocation(self.budget)
    }

    /// Non-fatal condition to surface alongside the result, if any
    pub fn warning(&self) -> Option<QfolioError> {
        match self.status {
            SolveStatus::Infeasible => Some(QfolioError::SolverInfeasible(format!(
                "{} solver returned a solution violating its constraints",
                self.solver
            ))),
            SolveStatus::TimedOut => Some(QfolioError::SolverTimeout(format!(
                "{} solver exhausted its budget after {} iterations without converging",
                self.solver,
                self.diagnostics.iterations()
            ))),
            SolveStatus::Cancelled => Some(QfolioError::Cancelled(format!(
                "{} solver was cancelled",
                self.solver
            ))),
            SolveStatus::Optimal | SolveStatus::Feasible => None,
        }
    }
}
