mod qp_builder;
mod classical;
mod frontier;

pub use qp_builder::QpBuilder;
pub use classical::{kkt_residual, solve_classical, ClassicalParams, ClassicalSolver};
pub use frontier::{efficient_frontier, FrontierPoint};
