mod qp_model;
mod backend;
mod clarabel_backend;

pub use qp_model::{QpModel, QpConstraint, VarMeta};
pub use backend::{SolverBackend, QpSolution, QpStatus};
pub use clarabel_backend::{ClarabelSettings, ClarabelSolver};
