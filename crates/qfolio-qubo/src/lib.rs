mod encoding;
mod qubo_model;
mod decode;
mod annealer;

pub use encoding::BinaryEncoding;
pub use qubo_model::{PenaltyConfig, PenaltyWeights, QuboModel};
pub use decode::{decode_assignment, finalize_weights, DecodedWeights, FinalizedWeights};
pub use annealer::{solve_qubo, AnnealingParams, AtomicBest, SimulatedAnnealer};

#[cfg(test)]
mod tests;
