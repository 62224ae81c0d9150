use nalgebra::DVector;
use qfolio_risk::MomentsModel;
use qfolio_types::{
    Constraints, Diagnostics, QfolioError, Result, RunBudget, SolveStatus, SolverKind,
    SolverResult, WeightVector,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::decode::{decode_assignment, finalize_weights};
use crate::qubo_model::{PenaltyConfig, QuboModel};

/// Simulated annealing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingParams {
    /// Temperature steps per restart; each proposes one flip per variable
    pub sweeps: usize,
    pub restarts: usize,
    /// Defaults to the largest linear coefficient magnitude
    pub initial_temperature: Option<f64>,
    /// Defaults to 1e-5 × initial temperature
    pub final_temperature: Option<f64>,
    pub seed: u64,
    pub time_limit_ms: Option<u64>,
    pub penalty: PenaltyConfig,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        AnnealingParams {
            sweeps: 1000,
            restarts: 8,
            initial_temperature: None,
            final_temperature: None,
            seed: 42,
            time_limit_ms: None,
            penalty: PenaltyConfig::default(),
        }
    }
}

/// Lowest energy seen by any worker, stored as f64 bits.
///
/// Restarts publish into it as they improve, which gives a live view of
/// progress across workers. The annealer's answer is still picked by the
/// ordered reduction over restart outcomes, so it does not depend on which
/// worker reached the cell first.
#[derive(Debug)]
pub struct AtomicBest(AtomicU64);

impl AtomicBest {
    pub fn new() -> Self {
        AtomicBest(AtomicU64::new(f64::INFINITY.to_bits()))
    }

    /// Record `energy` if it beats the current value; returns whether it did
    pub fn offer(&self, energy: f64) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if !(energy < f64::from_bits(current)) {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                energy.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

impl Default for AtomicBest {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone)]
struct RestartOutcome {
    index: usize,
    energy: f64,
    state: Vec<bool>,
    violations: usize,
    stopped: Option<StopReason>,
}

impl RestartOutcome {
    /// Valid encodings first, then energy, then restart index
    fn better_than(&self, other: &RestartOutcome) -> bool {
        let key = |o: &RestartOutcome| (o.violations > 0, o.energy, o.index);
        let (va, ea, ia) = key(self);
        let (vb, eb, ib) = key(other);
        va.cmp(&vb)
            .then(ea.total_cmp(&eb))
            .then(ia.cmp(&ib))
            .is_lt()
    }
}

/// Multi-restart simulated annealing over the penalty-augmented QUBO.
/// Restarts run in parallel; the merged result depends only on the seed.
pub struct SimulatedAnnealer {
    params: AnnealingParams,
}

impl SimulatedAnnealer {
    pub fn new(params: AnnealingParams) -> Self {
        SimulatedAnnealer { params }
    }

    pub fn params(&self) -> &AnnealingParams {
        &self.params
    }

    pub fn solve(
        &self,
        moments: &MomentsModel,
        constraints: &Constraints,
        budget: &RunBudget,
    ) -> Result<SolverResult> {
        let start = Instant::now();
        let model = QuboModel::build(moments, constraints, &self.params.penalty)?;
        let restarts = self.params.restarts.max(1);
        let sweeps = self.params.sweeps.max(1);

        let t0 = self
            .params
            .initial_temperature
            .unwrap_or_else(|| model.energy_scale());
        let t1 = self.params.final_temperature.unwrap_or(t0 * 1e-5).min(t0);
        if !(t0.is_finite() && t0 > 0.0 && t1.is_finite() && t1 > 0.0) {
            return Err(QfolioError::InvalidInput(format!(
                "annealing temperatures must be positive, got {} -> {}",
                t0, t1
            )));
        }
        let deadline = self
            .params
            .time_limit_ms
            .map(|ms| start + Duration::from_millis(ms));

        tracing::info!(
            variables = model.num_variables(),
            restarts,
            sweeps,
            initial_temperature = t0,
            "annealing started"
        );

        let global = AtomicBest::new();
        let stop_check = || {
            if budget.is_cancelled() {
                Some(StopReason::Cancelled)
            } else if budget.deadline_passed() || deadline.map_or(false, |d| Instant::now() >= d) {
                Some(StopReason::TimedOut)
            } else {
                None
            }
        };

        let outcomes: Vec<RestartOutcome> = (0..restarts)
            .into_par_iter()
            .map(|index| {
                let seed = restart_seed(self.params.seed, index);
                anneal_once(&model, index, seed, sweeps, t0, t1, &global, &stop_check)
            })
            .collect();

        let best = outcomes
            .iter()
            .cloned()
            .reduce(|a, b| if b.better_than(&a) { b } else { a })
            .ok_or_else(|| QfolioError::Internal("no annealing restarts ran".to_string()))?;

        let decoded = decode_assignment(model.encoding(), &best.state);
        let finalized = finalize_weights(&decoded.values, constraints);
        let weights = WeightVector::new(moments.assets().to_vec(), finalized.values)?;
        let w = DVector::from_column_slice(weights.as_slice());

        let stopped = outcomes.iter().filter_map(|o| o.stopped).min_by_key(|r| match r {
            StopReason::Cancelled => 0,
            StopReason::TimedOut => 1,
        });
        let infeasible = best.violations > 0 || !finalized.feasible;
        let status = match stopped {
            Some(StopReason::Cancelled) => SolveStatus::Cancelled,
            Some(StopReason::TimedOut) => SolveStatus::TimedOut,
            None if infeasible => SolveStatus::Infeasible,
            None => SolveStatus::Feasible,
        };

        let result = SolverResult {
            solver: SolverKind::Qubo,
            status,
            objective_value: moments.objective(&w, constraints.risk_aversion()),
            duration: start.elapsed(),
            constraint_satisfaction: constraints.check(&weights),
            infeasible,
            diagnostics: Diagnostics::Qubo {
                num_variables: model.num_variables(),
                penalties: model.penalties().to_map(),
                best_energy: best.energy,
                restarts,
                sweeps_per_restart: sweeps,
                restart_energies: outcomes.iter().map(|o| o.energy).collect(),
                one_hot_violations: decoded.one_hot_violations,
            },
            weights,
            budget: constraints.budget(),
        };

        tracing::info!(
            status = ?result.status,
            best_energy = best.energy,
            lowest_energy = global.get(),
            best_restart = best.index,
            elapsed_ms = result.duration.as_secs_f64() * 1e3,
            "annealing finished"
        );

        Ok(result)
    }
}

/// Anneal with default parameters and no cancellation
pub fn solve_qubo(moments: &MomentsModel, constraints: &Constraints) -> Result<SolverResult> {
    SimulatedAnnealer::new(AnnealingParams::default()).solve(
        moments,
        constraints,
        &RunBudget::unlimited(),
    )
}

fn restart_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[allow(clippy::too_many_arguments)]
fn anneal_once<F>(
    model: &QuboModel,
    index: usize,
    seed: u64,
    sweeps: usize,
    t0: f64,
    t1: f64,
    global: &AtomicBest,
    stop_check: &F,
) -> RestartOutcome
where
    F: Fn() -> Option<StopReason>,
{
    let mut rng = StdRng::seed_from_u64(seed);
    let n = model.num_variables();

    let mut x: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.5)).collect();
    let mut fields = model.local_fields(&x);
    let mut energy = model.energy(&x);
    let mut best_state = x.clone();
    let mut best_energy = energy;
    let mut stopped = None;

    let ratio = if sweeps > 1 { (t1 / t0).powf(1.0 / (sweeps - 1) as f64) } else { 1.0 };
    let mut temperature = t0;

    for _ in 0..sweeps {
        if let Some(reason) = stop_check() {
            stopped = Some(reason);
            break;
        }

        let mut improved = false;
        for _ in 0..n {
            let a = rng.gen_range(0..n);
            let delta = model.flip_delta(&fields, &x, a);
            if delta <= 0.0 || rng.gen::<f64>() < (-delta / temperature).exp() {
                model.apply_flip(&mut fields, &mut x, a);
                energy += delta;
                if energy < best_energy - 1e-12 {
                    best_energy = energy;
                    best_state.copy_from_slice(&x);
                    improved = true;
                }
            }
        }

        if improved && global.offer(best_energy) {
            tracing::trace!(restart = index, energy = best_energy, "new global best");
        }
        temperature *= ratio;
    }

    // Re-evaluate to shed accumulated rounding from incremental updates
    let energy = model.energy(&best_state);
    let violations = decode_assignment(model.encoding(), &best_state).one_hot_violations;
    global.offer(energy);

    tracing::debug!(restart = index, energy, violations, "restart finished");

    RestartOutcome {
        index,
        energy,
        state: best_state,
        violations,
        stopped,
    }
}
