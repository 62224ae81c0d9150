use qfolio_types::Result;
use serde::{Deserialize, Serialize};

use crate::qp_model::QpModel;

/// Termination state reported by a QP backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QpStatus {
    Optimal,
    PrimalInfeasible,
    DualInfeasible,
    MaxIterations,
    Unsolved,
}

impl QpStatus {
    /// The constraint rows admit no point at all
    pub fn is_infeasible(&self) -> bool {
        matches!(self, QpStatus::PrimalInfeasible)
    }
}

/// Primal point returned by a backend, in the model's variable order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QpSolution {
    pub x: Vec<f64>,
    pub status: QpStatus,
    /// ½xᵀPx + qᵀx at `x`
    pub objective: f64,
    pub iterations: usize,
}

impl QpSolution {
    pub(crate) fn infeasible(num_vars: usize) -> Self {
        QpSolution {
            x: vec![0.0; num_vars],
            status: QpStatus::PrimalInfeasible,
            objective: f64::NAN,
            iterations: 0,
        }
    }
}

/// A convex QP solver the classical optimizer can run on.
///
/// Implementations minimize ½xᵀPx + qᵀx subject to l ≤ Ax ≤ u and report
/// non-convergence through [`QpStatus`] rather than an error; `Err` is for
/// malformed models only.
pub trait SolverBackend: Send + Sync {
    fn solve_qp(&self, model: &QpModel) -> Result<QpSolution>;
}
