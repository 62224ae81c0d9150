use nalgebra::{DMatrix, DVector};
use qfolio_types::{AssetId, QfolioError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a decision variable stands for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarMeta {
    /// Portfolio weight of one asset
    Weight(AssetId),
}

/// Dense convex QP
///
/// ```text
/// minimize    ½ xᵀ P x + qᵀ x
/// subject to  l ≤ A x ≤ u
/// ```
///
/// P must be symmetric positive semidefinite. Infinite entries of `l`/`u`
/// leave that side of a row open.
#[derive(Debug, Clone)]
pub struct QpModel {
    pub p: DMatrix<f64>,
    pub q: DVector<f64>,
    pub a: DMatrix<f64>,
    pub l: DVector<f64>,
    pub u: DVector<f64>,
    pub var_meta: Vec<VarMeta>,
}

impl QpModel {
    pub fn new(
        p: DMatrix<f64>,
        q: DVector<f64>,
        a: DMatrix<f64>,
        l: DVector<f64>,
        u: DVector<f64>,
        var_meta: Vec<VarMeta>,
    ) -> Self {
        QpModel { p, q, a, l, u, var_meta }
    }

    /// Stack sparse rows into A, l and u, keeping their order
    pub fn from_constraints(
        p: DMatrix<f64>,
        q: DVector<f64>,
        constraints: &[QpConstraint],
        var_meta: Vec<VarMeta>,
    ) -> Self {
        let n = q.len();
        let a = DMatrix::from_fn(constraints.len(), n, |row, col| {
            constraints[row].coeffs.get(&col).copied().unwrap_or(0.0)
        });
        let l = DVector::from_iterator(constraints.len(), constraints.iter().map(|c| c.lower));
        let u = DVector::from_iterator(constraints.len(), constraints.iter().map(|c| c.upper));

        QpModel::new(p, q, a, l, u, var_meta)
    }

    pub fn num_vars(&self) -> usize {
        self.q.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.l.len()
    }

    /// Asset behind variable `index`, if it is a weight
    pub fn asset(&self, index: usize) -> Option<&AssetId> {
        match self.var_meta.get(index) {
            Some(VarMeta::Weight(asset)) => Some(asset),
            None => None,
        }
    }

    /// ½xᵀPx + qᵀx
    pub fn objective(&self, x: &DVector<f64>) -> f64 {
        0.5 * x.dot(&(&self.p * x)) + self.q.dot(x)
    }

    /// Shapes agree and every coefficient is finite
    pub fn validate(&self) -> Result<()> {
        let n = self.num_vars();
        let m = self.num_constraints();
        let malformed = |msg: String| Err(QfolioError::SolverDivergence(msg));

        if self.p.shape() != (n, n) {
            return malformed(format!("P is {:?}, expected ({}, {})", self.p.shape(), n, n));
        }
        if self.a.shape() != (m, n) || self.u.len() != m {
            return malformed(format!(
                "A is {:?} with {} upper bounds, expected ({}, {}) and {}",
                self.a.shape(),
                self.u.len(),
                m,
                n,
                m
            ));
        }
        if self.var_meta.len() != n {
            return malformed(format!("{} variable labels for {} variables", self.var_meta.len(), n));
        }
        if self.p.iter().chain(self.q.iter()).chain(self.a.iter()).any(|v| !v.is_finite()) {
            return malformed("model contains non-finite coefficients".to_string());
        }

        Ok(())
    }
}

/// One sparse row `lower ≤ Σ coeffs[j]·x[j] ≤ upper`
#[derive(Debug, Clone)]
pub struct QpConstraint {
    /// Variable index to coefficient
    pub coeffs: BTreeMap<usize, f64>,
    pub lower: f64,
    pub upper: f64,
}

impl QpConstraint {
    pub fn eq(coeffs: BTreeMap<usize, f64>, value: f64) -> Self {
        QpConstraint {
            coeffs,
            lower: value,
            upper: value,
        }
    }

    pub fn ineq(coeffs: BTreeMap<usize, f64>, lower: f64, upper: f64) -> Self {
        QpConstraint { coeffs, lower, upper }
    }

    /// `lower ≤ x[index] ≤ upper`
    pub fn bound(index: usize, lower: f64, upper: f64) -> Self {
        QpConstraint {
            coeffs: BTreeMap::from([(index, 1.0)]),
            lower,
            upper,
        }
    }
}
