use nalgebra::{DMatrix, DVector};
use qfolio_types::{AssetId, QfolioError, Result, ReturnSeries};

use crate::matrix_utils::{largest_eigenvalue, quad_form, symmetrize, validate_psd};

const PSD_TOLERANCE: f64 = 1e-9;

/// Expected returns μ and covariance Σ for one optimization request.
/// Immutable once built; solvers share it by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentsModel {
    assets: Vec<AssetId>,
    mu: DVector<f64>,
    sigma: DMatrix<f64>,
    observations: usize,
    annualization: f64,
}

impl MomentsModel {
    /// Build from externally supplied moments, validating shape, symmetry and PSD
    pub fn new(assets: Vec<AssetId>, mu: DVector<f64>, sigma: DMatrix<f64>) -> Result<Self> {
        let n = assets.len();
        if n == 0 {
            return Err(QfolioError::InvalidInput(
                "moments need at least one asset".to_string(),
            ));
        }
        if mu.len() != n || sigma.nrows() != n || sigma.ncols() != n {
            return Err(QfolioError::AssetMismatch(format!(
                "{} assets but μ has {} entries and Σ is {}x{}",
                n,
                mu.len(),
                sigma.nrows(),
                sigma.ncols()
            )));
        }
        if mu.iter().any(|v| !v.is_finite()) {
            return Err(QfolioError::InvalidInput(
                "expected returns must be finite".to_string(),
            ));
        }
        if !validate_psd(&sigma, PSD_TOLERANCE) {
            return Err(QfolioError::InvalidInput(
                "covariance must be symmetric positive semi-definite".to_string(),
            ));
        }

        Ok(MomentsModel {
            assets,
            mu,
            sigma: symmetrize(&sigma),
            observations: 0,
            annualization: 1.0,
        })
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    /// Expected-return vector μ
    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    /// Covariance matrix Σ
    pub fn sigma(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    /// Number of return observations the moments were estimated from
    /// (0 when supplied directly)
    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn annualization(&self) -> f64 {
        self.annualization
    }

    pub fn expected_return(&self, w: &DVector<f64>) -> f64 {
        self.mu.dot(w)
    }

    pub fn variance(&self, w: &DVector<f64>) -> f64 {
        quad_form(&self.sigma, w)
    }

    /// Mean-variance utility μᵀw − (λ/2) wᵀΣw
    pub fn objective(&self, w: &DVector<f64>, risk_aversion: f64) -> f64 {
        self.expected_return(w) - 0.5 * risk_aversion * self.variance(w)
    }

    pub fn largest_eigenvalue(&self) -> f64 {
        largest_eigenvalue(&self.sigma)
    }
}

/// Sample mean and covariance (N−1 denominator) of the periodic returns
pub fn compute_moments(returns: &ReturnSeries) -> Result<MomentsModel> {
    compute_moments_annualized(returns, 1.0)
}

/// Same as [`compute_moments`], scaling μ and Σ by `factor` periods per year
pub fn compute_moments_annualized(returns: &ReturnSeries, factor: f64) -> Result<MomentsModel> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(QfolioError::InvalidInput(format!(
            "annualization factor must be positive, got {}",
            factor
        )));
    }

    let t = returns.num_observations();
    let n = returns.num_assets();
    if t < 2 {
        return Err(QfolioError::InsufficientData(format!(
            "need at least 2 aligned observations, got {}",
            t
        )));
    }

    let rows = returns.observations();
    if let Some(bad) = rows.iter().position(|row| row.len() != n) {
        return Err(QfolioError::AssetMismatch(format!(
            "observation {} has {} values for {} assets",
            bad,
            rows[bad].len(),
            n
        )));
    }

    let data = DMatrix::from_fn(t, n, |r, c| rows[r][c]);
    let mean = DVector::from_fn(n, |c, _| data.column(c).sum() / t as f64);

    let mut centered = data;
    for c in 0..n {
        let m = mean[c];
        centered.column_mut(c).iter_mut().for_each(|v| *v -= m);
    }
    let cov = centered.transpose() * &centered / (t as f64 - 1.0);

    tracing::debug!(assets = n, observations = t, factor, "computed sample moments");

    Ok(MomentsModel {
        assets: returns.assets().to_vec(),
        mu: mean * factor,
        sigma: symmetrize(&cov) * factor,
        observations: t,
        annualization: factor,
    })
}
