use nalgebra::DVector;
use qfolio_qubo::{decode_assignment, finalize_weights, PenaltyConfig, QuboModel};
use qfolio_risk::MomentsModel;
use qfolio_types::{
    Constraints, Diagnostics, QfolioError, Result, RunBudget, SolveStatus, SolverKind,
    SolverResult, WeightVector,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::sampler::{mix_seed, sample_batch, SampleBatch, VariationalAnsatz};

/// Variational sampler parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationalParams {
    #[serde(alias = "p_layers")]
    pub layers: usize,
    pub shots: usize,
    pub max_iterations: usize,
    /// Fixed SPSA step size
    pub learning_rate: f64,
    /// SPSA perturbation half-width
    pub perturbation: f64,
    /// Relative improvement below which an iteration counts as a plateau
    pub tolerance: f64,
    /// Consecutive plateau iterations that mean convergence
    pub patience: usize,
    pub initial_mixing: f64,
    pub initial_bias: f64,
    pub seed: u64,
    pub time_limit_ms: Option<u64>,
    pub penalty: PenaltyConfig,
}

impl Default for VariationalParams {
    fn default() -> Self {
        VariationalParams {
            layers: 1,
            shots: 1024,
            max_iterations: 100,
            learning_rate: 0.2,
            perturbation: 0.1,
            tolerance: 1e-3,
            patience: 5,
            initial_mixing: 0.1,
            initial_bias: 1.0,
            seed: 42,
            time_limit_ms: None,
            penalty: PenaltyConfig::default(),
        }
    }
}

/// Trains a [`VariationalAnsatz`] with SPSA and returns its best sample
pub struct VariationalSolver {
    params: VariationalParams,
}

struct Incumbent {
    energy: f64,
    sample: Vec<bool>,
}

impl Incumbent {
    fn absorb(&mut self, batch: &SampleBatch) {
        if !batch.best_sample.is_empty() && batch.best_energy < self.energy {
            self.energy = batch.best_energy;
            self.sample = batch.best_sample.clone();
        }
    }
}

impl VariationalSolver {
    pub fn new(params: VariationalParams) -> Self {
        VariationalSolver { params }
    }

    pub fn params(&self) -> &VariationalParams {
        &self.params
    }

    pub fn solve(
        &self,
        moments: &MomentsModel,
        constraints: &Constraints,
        budget: &RunBudget,
    ) -> Result<SolverResult> {
        let start = Instant::now();
        let p = &self.params;
        if p.shots == 0 {
            return Err(QfolioError::InvalidInput("shots must be at least 1".to_string()));
        }
        if !(p.learning_rate.is_finite() && p.learning_rate > 0.0)
            || !(p.perturbation.is_finite() && p.perturbation > 0.0)
        {
            return Err(QfolioError::InvalidInput(format!(
                "learning rate and perturbation must be positive, got {} and {}",
                p.learning_rate, p.perturbation
            )));
        }

        let model = QuboModel::build(moments, constraints, &p.penalty)?;
        let scale = model.penalties().one_hot;
        let ansatz = VariationalAnsatz::new(&model, p.layers, scale);
        let deadline = p.time_limit_ms.map(|ms| start + Duration::from_millis(ms));

        tracing::info!(
            variables = model.num_variables(),
            layers = p.layers,
            shots = p.shots,
            max_iterations = p.max_iterations,
            "variational sampler started"
        );

        let mut theta: Vec<f64> = (0..p.layers)
            .flat_map(|_| [p.initial_mixing, p.initial_bias])
            .collect();
        let mut incumbent = Incumbent {
            energy: f64::INFINITY,
            sample: Vec::new(),
        };
        let mut history = Vec::new();
        let mut iterations = 0;
        let mut converged = false;
        let mut stopped = None;

        if p.layers == 0 {
            // Nothing to train: a single uniform batch
            let batch = sample_batch(&ansatz, &theta, p.shots, mix_seed(p.seed, 0));
            history.push(batch.mean_energy);
            incumbent.absorb(&batch);
            converged = true;
        } else {
            let mut rng = StdRng::seed_from_u64(p.seed);
            let mut best_mean = f64::INFINITY;
            let mut plateau = 0;

            while iterations < p.max_iterations {
                if budget.is_cancelled() {
                    stopped = Some(SolveStatus::Cancelled);
                    break;
                }
                if budget.deadline_passed() || deadline.map_or(false, |d| Instant::now() >= d) {
                    stopped = Some(SolveStatus::TimedOut);
                    break;
                }

                // Both sides share one seed so the difference is not shot noise
                let batch_seed = mix_seed(p.seed, iterations as u64 + 1);
                let delta: Vec<f64> = theta
                    .iter()
                    .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
                    .collect();
                let plus: Vec<f64> = theta
                    .iter()
                    .zip(&delta)
                    .map(|(t, d)| t + p.perturbation * d)
                    .collect();
                let minus: Vec<f64> = theta
                    .iter()
                    .zip(&delta)
                    .map(|(t, d)| t - p.perturbation * d)
                    .collect();

                let up = sample_batch(&ansatz, &plus, p.shots, batch_seed);
                let down = sample_batch(&ansatz, &minus, p.shots, batch_seed);
                incumbent.absorb(&up);
                incumbent.absorb(&down);

                let diff = (up.mean_energy - down.mean_energy) / (2.0 * p.perturbation);
                for (t, d) in theta.iter_mut().zip(&delta) {
                    *t -= p.learning_rate * diff / (d * scale);
                }

                let estimate = 0.5 * (up.mean_energy + down.mean_energy);
                history.push(estimate);
                iterations += 1;

                let improvement = (best_mean - estimate) / best_mean.abs().max(1e-12);
                if best_mean.is_finite() && improvement < p.tolerance {
                    plateau += 1;
                } else {
                    plateau = 0;
                }
                best_mean = best_mean.min(estimate);

                tracing::debug!(
                    iteration = iterations,
                    expected_energy = estimate,
                    best_sample = incumbent.energy,
                    plateau,
                    "variational iteration"
                );

                if plateau >= p.patience {
                    converged = true;
                    break;
                }
            }

            // Budget spent before any batch: sample once at the starting point
            if incumbent.sample.is_empty() {
                let batch = sample_batch(&ansatz, &theta, p.shots, mix_seed(p.seed, 0));
                incumbent.absorb(&batch);
            }
        }

        let decoded = decode_assignment(model.encoding(), &incumbent.sample);
        let finalized = finalize_weights(&decoded.values, constraints);
        let weights = WeightVector::new(moments.assets().to_vec(), finalized.values)?;
        let w = DVector::from_column_slice(weights.as_slice());

        let infeasible = decoded.one_hot_violations > 0 || !finalized.feasible;
        let status = match stopped {
            Some(s) => s,
            None if !converged => SolveStatus::TimedOut,
            None if infeasible => SolveStatus::Infeasible,
            None => SolveStatus::Feasible,
        };

        let result = SolverResult {
            solver: SolverKind::Variational,
            status,
            objective_value: moments.objective(&w, constraints.risk_aversion()),
            duration: start.elapsed(),
            constraint_satisfaction: constraints.check(&weights),
            infeasible,
            diagnostics: Diagnostics::Variational {
                layers: p.layers,
                num_parameters: ansatz.num_parameters(),
                shots: p.shots,
                iterations,
                converged,
                best_energy: incumbent.energy,
                final_parameters: theta,
                energy_history: history,
                one_hot_violations: decoded.one_hot_violations,
            },
            weights,
            budget: constraints.budget(),
        };

        if result.status == SolveStatus::TimedOut {
            tracing::warn!(iterations, "variational sampler stopped before reaching a plateau");
        }
        tracing::info!(
            status = ?result.status,
            best_energy = incumbent.energy,
            iterations,
            elapsed_ms = result.duration.as_secs_f64() * 1e3,
            "variational sampler finished"
        );

        Ok(result)
    }
}

/// Train with default tuning and the given shape, without cancellation
pub fn solve_variational(
    moments: &MomentsModel,
    constraints: &Constraints,
    layers: usize,
    shots: usize,
    max_iterations: usize,
) -> Result<SolverResult> {
    let params = VariationalParams {
        layers,
        shots,
        max_iterations,
        ..Default::default()
    };
    VariationalSolver::new(params).solve(moments, constraints, &RunBudget::unlimited())
}
