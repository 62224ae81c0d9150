use nalgebra::DVector;
use qfolio_risk::MomentsModel;
use qfolio_solver::{QpConstraint, QpModel, VarMeta};
use qfolio_types::{Constraints, QfolioError, Result};
use std::collections::BTreeMap;

/// Builder for the mean-variance QP
pub struct QpBuilder;

impl QpBuilder {
    /// maximize μᵀw − (λ/2) wᵀΣw  s.t.  Σw = 1, lo ≤ w ≤ hi,
    /// written in minimization form with P = λΣ and q = −μ.
    /// Assets flagged in `pinned` are fixed at zero.
    pub fn build(moments: &MomentsModel, constraints: &Constraints, pinned: &[bool]) -> Result<QpModel> {
        let n = moments.num_assets();
        if constraints.num_assets() != n || pinned.len() != n {
            return Err(QfolioError::AssetMismatch(format!(
                "moments cover {} assets, constraints {}, pin mask {}",
                n,
                constraints.num_assets(),
                pinned.len()
            )));
        }

        let p = moments.sigma() * constraints.risk_aversion();
        let q: DVector<f64> = -moments.mu().clone();

        let mut rows = Vec::with_capacity(n + 1);

        // Fully invested
        let budget: BTreeMap<usize, f64> = (0..n).map(|i| (i, 1.0)).collect();
        rows.push(QpConstraint::eq(budget, 1.0));

        let (lo, hi) = constraints.weight_bounds();
        for (i, &is_pinned) in pinned.iter().enumerate() {
            if is_pinned {
                rows.push(QpConstraint::bound(i, 0.0, 0.0));
            } else {
                rows.push(QpConstraint::bound(i, lo, hi));
            }
        }

        let var_meta = moments
            .assets()
            .iter()
            .map(|a| VarMeta::Weight(a.clone()))
            .collect();

        Ok(QpModel::from_constraints(p, q, &rows, var_meta))
    }
}
