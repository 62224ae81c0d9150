use qfolio_qubo::QuboModel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Layered sampling distribution over the bits of a QUBO.
///
/// Parameters are laid out as `[β₀, γ₀, β₁, γ₁, …]`: β is the mixing angle,
/// γ the bias strength in units of `scale`.
pub struct VariationalAnsatz<'a> {
    model: &'a QuboModel,
    layers: usize,
    scale: f64,
}

impl<'a> VariationalAnsatz<'a> {
    pub fn new(model: &'a QuboModel, layers: usize, scale: f64) -> Self {
        VariationalAnsatz {
            model,
            layers,
            scale,
        }
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn num_parameters(&self) -> usize {
        2 * self.layers
    }

    pub fn model(&self) -> &QuboModel {
        self.model
    }

    /// Draw one bit string. With zero layers this is a uniform sample.
    pub fn sample(&self, params: &[f64], seed: u64) -> (f64, Vec<bool>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = self.model.num_variables();
        let mut x: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.5)).collect();

        if self.layers > 0 {
            let mut fields = self.model.local_fields(&x);
            for layer in params.chunks_exact(2).take(self.layers) {
                let (beta, gamma) = (layer[0], layer[1]);

                // Problem bias: resample each bit from its conditional
                for a in 0..n {
                    let p_on = logistic(-gamma * fields[a] / self.scale);
                    if (rng.gen::<f64>() < p_on) != x[a] {
                        self.model.apply_flip(&mut fields, &mut x, a);
                    }
                }

                // Mixing
                let p_flip = beta.sin().powi(2);
                for a in 0..n {
                    if rng.gen::<f64>() < p_flip {
                        self.model.apply_flip(&mut fields, &mut x, a);
                    }
                }
            }
        }

        (self.model.energy(&x), x)
    }
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Statistics of one batch of shots
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    pub mean_energy: f64,
    pub std_error: f64,
    pub best_energy: f64,
    pub best_sample: Vec<bool>,
}

/// Draw `shots` samples in parallel; shot `s` is seeded from `seed` and `s`
/// so the batch is reproducible regardless of scheduling.
pub fn sample_batch(ansatz: &VariationalAnsatz<'_>, params: &[f64], shots: usize, seed: u64) -> SampleBatch {
    let shots = shots.max(1);
    let samples: Vec<(f64, Vec<bool>)> = (0..shots)
        .into_par_iter()
        .map(|s| ansatz.sample(params, mix_seed(seed, s as u64)))
        .collect();

    let energies: Vec<f64> = samples.iter().map(|(e, _)| *e).collect();
    let mean = energies.iter().sum::<f64>() / shots as f64;
    let var = if shots > 1 {
        energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / (shots - 1) as f64
    } else {
        0.0
    };

    let (best_energy, best_sample) = samples
        .into_iter()
        .reduce(|a, b| if b.0 < a.0 { b } else { a })
        .unwrap_or_default();

    SampleBatch {
        mean_energy: mean,
        std_error: (var / shots as f64).sqrt(),
        best_energy,
        best_sample,
    }
}

pub(crate) fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut z = seed ^ salt.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
