use nalgebra::{DMatrix, DVector};
use qfolio_risk::MomentsModel;
use qfolio_types::{Constraints, QfolioError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::encoding::BinaryEncoding;

/// How penalty coefficients are derived from the objective scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    /// Scale applied to λ·λmax(Σ) + max|μ|
    pub multiplier: f64,
    /// Added on top so the penalty stays positive for flat objectives
    pub margin: f64,
    /// Fixed coefficient, bypassing the scale rule
    pub coefficient: Option<f64>,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        PenaltyConfig {
            multiplier: 10.0,
            margin: 1.0,
            coefficient: None,
        }
    }
}

impl PenaltyConfig {
    pub fn coefficient_for(&self, moments: &MomentsModel, risk_aversion: f64) -> Result<f64> {
        let value = match self.coefficient {
            Some(c) => c,
            None => {
                let max_mu = moments.mu().iter().fold(0.0f64, |m, v| m.max(v.abs()));
                let scale = risk_aversion * moments.largest_eigenvalue().max(0.0) + max_mu;
                self.multiplier * scale + self.margin
            }
        };
        if !value.is_finite() || value <= 0.0 {
            return Err(QfolioError::InvalidInput(format!(
                "penalty coefficient must be positive, got {}",
                value
            )));
        }
        Ok(value)
    }
}

/// Penalty coefficients folded into a QUBO
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyWeights {
    pub one_hot: f64,
    pub budget: f64,
    /// Present only when the cardinality limit binds
    pub cardinality: Option<f64>,
}

impl PenaltyWeights {
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("one_hot".to_string(), self.one_hot);
        map.insert("budget".to_string(), self.budget);
        if let Some(c) = self.cardinality {
            map.insert("cardinality".to_string(), c);
        }
        map
    }
}

/// E(x) = offset + Σ h_a x_a + Σ_{a<b} J_ab x_a x_b over binary x.
/// `j` is symmetric with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct QuboModel {
    h: DVector<f64>,
    j: DMatrix<f64>,
    offset: f64,
    encoding: BinaryEncoding,
    penalties: PenaltyWeights,
}

impl QuboModel {
    /// Penalty-augmented QUBO for
    /// −μᵀw + (λ/2) wᵀΣw + A Σ_i (Σ_j x_ij − 1)² + B (Σ ℓ x − 1)²
    /// plus C (Σ_{j≥1} x_ij − M)² when the cardinality limit M binds.
    pub fn build(
        moments: &MomentsModel,
        constraints: &Constraints,
        penalty: &PenaltyConfig,
    ) -> Result<Self> {
        let n = moments.num_assets();
        if constraints.num_assets() != n {
            return Err(QfolioError::AssetMismatch(format!(
                "moments cover {} assets, constraints {}",
                n,
                constraints.num_assets()
            )));
        }

        let encoding = BinaryEncoding::new(moments.assets().to_vec(), constraints);
        let k = encoding.levels_per_asset();
        let nv = encoding.num_variables();
        let lambda = constraints.risk_aversion();
        let mu = moments.mu();
        let sigma = moments.sigma();
        let levels = encoding.levels().to_vec();

        let coefficient = penalty.coefficient_for(moments, lambda)?;
        let penalties = PenaltyWeights {
            one_hot: coefficient,
            budget: coefficient,
            cardinality: constraints.cardinality_binds().then_some(coefficient),
        };

        let mut h = DVector::zeros(nv);
        let mut j = DMatrix::zeros(nv, nv);
        let mut offset = 0.0;

        // Return and risk
        for a in 0..nv {
            let (ia, ba) = encoding.position(a);
            let la = levels[ba];
            h[a] += -mu[ia] * la + 0.5 * lambda * sigma[(ia, ia)] * la * la;
            for b in (a + 1)..nv {
                let (ib, bb) = encoding.position(b);
                j[(a, b)] += lambda * sigma[(ia, ib)] * la * levels[bb];
            }
        }

        // Exactly one bucket per asset
        let one_hot = penalties.one_hot;
        for i in 0..n {
            offset += one_hot;
            for ba in 0..k {
                let a = encoding.index(i, ba);
                h[a] -= one_hot;
                for bb in (ba + 1)..k {
                    j[(a, encoding.index(i, bb))] += 2.0 * one_hot;
                }
            }
        }

        // Fully invested
        let budget = penalties.budget;
        offset += budget;
        for a in 0..nv {
            let la = encoding.weight_of(a);
            h[a] += budget * (la * la - 2.0 * la);
            for b in (a + 1)..nv {
                j[(a, b)] += 2.0 * budget * la * encoding.weight_of(b);
            }
        }

        // Held-asset count target
        if let Some(card) = penalties.cardinality {
            let m = constraints.max_assets() as f64;
            offset += card * m * m;
            let held: Vec<usize> = (0..nv).filter(|&a| encoding.position(a).1 > 0).collect();
            for (pos, &a) in held.iter().enumerate() {
                h[a] += card * (1.0 - 2.0 * m);
                for &b in &held[pos + 1..] {
                    j[(a, b)] += 2.0 * card;
                }
            }
        }

        // Mirror the upper triangle
        for a in 0..nv {
            for b in (a + 1)..nv {
                j[(b, a)] = j[(a, b)];
            }
        }

        tracing::debug!(
            variables = nv,
            levels = k,
            penalty = coefficient,
            "built QUBO"
        );

        Ok(QuboModel {
            h,
            j,
            offset,
            encoding,
            penalties,
        })
    }

    pub fn num_variables(&self) -> usize {
        self.h.len()
    }

    pub fn encoding(&self) -> &BinaryEncoding {
        &self.encoding
    }

    pub fn penalties(&self) -> &PenaltyWeights {
        &self.penalties
    }

    pub fn linear(&self) -> &DVector<f64> {
        &self.h
    }

    pub fn coupling(&self) -> &DMatrix<f64> {
        &self.j
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn energy(&self, x: &[bool]) -> f64 {
        let mut e = self.offset;
        for a in 0..x.len() {
            if !x[a] {
                continue;
            }
            e += self.h[a];
            for b in (a + 1)..x.len() {
                if x[b] {
                    e += self.j[(a, b)];
                }
            }
        }
        e
    }

    /// f_a = h_a + Σ_b J_ab x_b
    pub fn local_fields(&self, x: &[bool]) -> Vec<f64> {
        (0..x.len())
            .map(|a| {
                let coupled: f64 = (0..x.len())
                    .filter(|&b| x[b])
                    .map(|b| self.j[(a, b)])
                    .sum();
                self.h[a] + coupled
            })
            .collect()
    }

    /// Energy change from flipping variable `a`
    pub fn flip_delta(&self, fields: &[f64], x: &[bool], a: usize) -> f64 {
        if x[a] {
            -fields[a]
        } else {
            fields[a]
        }
    }

    /// Flip variable `a` and update every local field in place
    pub fn apply_flip(&self, fields: &mut [f64], x: &mut [bool], a: usize) {
        let step = if x[a] { -1.0 } else { 1.0 };
        x[a] = !x[a];
        for (b, field) in fields.iter_mut().enumerate() {
            *field += self.j[(b, a)] * step;
        }
    }

    /// Typical single-flip energy magnitude, used to scale temperatures
    pub fn energy_scale(&self) -> f64 {
        self.h.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(1e-9)
    }
}
