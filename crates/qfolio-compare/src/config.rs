use qfolio_metrics::{Metric, MetricsConfig};
use qfolio_types::{QfolioError, Result, ReturnKind};
use serde::{Deserialize, Serialize};

/// Engine-wide settings, constant across requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Periods per year used to annualize μ, Σ and the metrics
    pub annualization: f64,
    pub return_kind: ReturnKind,
    /// Annual risk-free rate for Sharpe and Sortino
    pub risk_free_rate: f64,
    pub cvar_confidence: f64,
    /// Worker threads for the solver pool (rayon's default when unset)
    pub worker_threads: Option<usize>,
    /// Used when a request does not name one
    pub ranking_metric: Metric,
    /// Points on the efficient frontier; 0 disables it
    pub frontier_points: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            annualization: 252.0,
            return_kind: ReturnKind::Log,
            risk_free_rate: 0.02,
            cvar_confidence: 0.95,
            worker_threads: None,
            ranking_metric: Metric::SharpeRatio,
            frontier_points: 0,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.annualization.is_finite() || self.annualization <= 0.0 {
            return Err(QfolioError::InvalidInput(format!(
                "annualization must be positive, got {}",
                self.annualization
            )));
        }
        if !(self.cvar_confidence > 0.0 && self.cvar_confidence < 1.0) {
            return Err(QfolioError::InvalidInput(format!(
                "cvar_confidence must be in (0, 1), got {}",
                self.cvar_confidence
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(QfolioError::InvalidInput(
                "risk_free_rate must be finite".to_string(),
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(QfolioError::InvalidInput(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            risk_free_rate: self.risk_free_rate,
            annualization: self.annualization,
            cvar_confidence: self.cvar_confidence,
        }
    }
}
