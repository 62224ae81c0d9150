//! Quantum-inspired variational sampler.
//!
//! This is a classical surrogate, not a circuit simulation. Each layer of the
//! "circuit" is a Gibbs sweep over the QUBO energy landscape at an inverse
//! temperature set by a bias angle, followed by independent bit flips with
//! probability sin²(mixing angle). The resulting distribution over bit
//! strings is parameterized and trainable like a layered variational ansatz,
//! but sampling costs grow polynomially with the number of variables.

mod sampler;
mod trainer;

pub use sampler::{sample_batch, SampleBatch, VariationalAnsatz};
pub use trainer::{solve_variational, VariationalParams, VariationalSolver};
