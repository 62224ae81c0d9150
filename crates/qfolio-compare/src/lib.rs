mod config;
mod request;
mod report;
mod comparator;
mod pool;

pub use config::EngineConfig;
pub use request::{OptimizationRequest, SolverParams};
pub use report::{ComparisonReport, MetricWinner, SolverFailure, SolverFlags, SolverReport};
pub use comparator::{compare, run_solver, Comparator};
pub use pool::{JobHandle, JobStatus, SolverPool};
