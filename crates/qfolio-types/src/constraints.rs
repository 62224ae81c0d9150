use serde::{Deserialize, Serialize};

use crate::error::{QfolioError, Result};
use crate::solver::ConstraintSatisfaction;
use crate::weights::{WeightVector, WEIGHT_TOLERANCE};

/// Raw constraint configuration as it arrives in an optimization request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Capital to allocate; weights are fractions of it
    pub budget: f64,
    /// Maximum number of assets with non-zero weight (defaults to all)
    pub max_assets: Option<usize>,
    pub max_weight_per_asset: f64,
    /// λ in μᵀw − (λ/2) wᵀΣw
    pub risk_aversion: f64,
    /// Number of weight buckets per asset for the binary encodings
    pub discretization_levels: usize,
    pub allow_short_selling: bool,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        ConstraintConfig {
            budget: 1.0,
            max_assets: None,
            max_weight_per_asset: 1.0,
            risk_aversion: 1.0,
            discretization_levels: 10,
            allow_short_selling: false,
        }
    }
}

impl ConstraintConfig {
    /// Validate against the number of assets in the request
    pub fn validate(&self, num_assets: usize) -> Result<Constraints> {
        if num_assets == 0 {
            return Err(QfolioError::InvalidInput(
                "constraints need at least one asset".to_string(),
            ));
        }

        if !self.budget.is_finite() || self.budget <= 0.0 {
            return Err(QfolioError::invalid_constraint(
                "budget",
                format!("must be positive, got {}", self.budget),
            ));
        }

        let max_assets = self.max_assets.unwrap_or(num_assets);
        if max_assets < 1 || max_assets > num_assets {
            return Err(QfolioError::invalid_constraint(
                "max_assets",
                format!("must be in [1, {}], got {}", num_assets, max_assets),
            ));
        }

        let cap = self.max_weight_per_asset;
        if !cap.is_finite() || cap <= 0.0 || cap > 1.0 {
            return Err(QfolioError::invalid_constraint(
                "max_weight_per_asset",
                format!("must be in (0, 1], got {}", cap),
            ));
        }

        if !self.risk_aversion.is_finite() || self.risk_aversion < 0.0 {
            return Err(QfolioError::invalid_constraint(
                "risk_aversion",
                format!("must be non-negative, got {}", self.risk_aversion),
            ));
        }

        if self.discretization_levels < 2 {
            return Err(QfolioError::invalid_constraint(
                "discretization_levels",
                format!("must be at least 2, got {}", self.discretization_levels),
            ));
        }

        Ok(Constraints {
            num_assets,
            budget: self.budget,
            max_assets,
            max_weight_per_asset: cap,
            risk_aversion: self.risk_aversion,
            discretization_levels: self.discretization_levels,
            allow_short_selling: self.allow_short_selling,
        })
    }
}

/// Validated constraint set shared read-only by every solver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraints {
    num_assets: usize,
    budget: f64,
    max_assets: usize,
    max_weight_per_asset: f64,
    risk_aversion: f64,
    discretization_levels: usize,
    allow_short_selling: bool,
}

impl Constraints {
    /// Tolerance used when checking a solution against the constraints
    pub const CHECK_TOLERANCE: f64 = 1e-6;

    pub fn num_assets(&self) -> usize {
        self.num_assets
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn max_assets(&self) -> usize {
        self.max_assets
    }

    pub fn max_weight_per_asset(&self) -> f64 {
        self.max_weight_per_asset
    }

    pub fn risk_aversion(&self) -> f64 {
        self.risk_aversion
    }

    pub fn discretization_levels(&self) -> usize {
        self.discretization_levels
    }

    pub fn allow_short_selling(&self) -> bool {
        self.allow_short_selling
    }

    /// Same constraints with a different risk-aversion coefficient
    pub fn with_risk_aversion(&self, risk_aversion: f64) -> Result<Self> {
        if !risk_aversion.is_finite() || risk_aversion < 0.0 {
            return Err(QfolioError::invalid_constraint(
                "risk_aversion",
                format!("must be non-negative, got {}", risk_aversion),
            ));
        }
        Ok(Constraints {
            risk_aversion,
            ..self.clone()
        })
    }

    /// Per-asset (lower, upper) weight bounds
    pub fn weight_bounds(&self) -> (f64, f64) {
        let cap = self.max_weight_per_asset;
        if self.allow_short_selling {
            (-cap, cap)
        } else {
            (0.0, cap)
        }
    }

    /// True when the cardinality limit can actually cut assets
    pub fn cardinality_binds(&self) -> bool {
        self.max_assets < self.num_assets
    }

    /// Check a weight vector against every constraint
    pub fn check(&self, weights: &WeightVector) -> ConstraintSatisfaction {
        let tol = Self::CHECK_TOLERANCE;
        let values = weights.as_slice();
        ConstraintSatisfaction {
            budget: (weights.sum() - 1.0).abs() <= tol,
            max_weight: values.iter().all(|w| w.abs() <= self.max_weight_per_asset + tol),
            cardinality: weights.active_count(WEIGHT_TOLERANCE) <= self.max_assets,
            non_negative: if self.allow_short_selling {
                None
            } else {
                Some(values.iter().all(|w| *w >= -tol))
            },
        }
    }
}
