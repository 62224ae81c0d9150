use nalgebra::DVector;
use qfolio_risk::compute_moments_annualized;
use qfolio_types::{AssetId, QfolioError, Result, ReturnSeries, WeightVector, WEIGHT_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEGENERATE_EPS: f64 = 1e-12;

/// Settings shared by every metric computation in a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Annual risk-free rate
    pub risk_free_rate: f64,
    /// Periods per year
    pub annualization: f64,
    pub cvar_confidence: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            risk_free_rate: 0.02,
            annualization: 252.0,
            cvar_confidence: 0.95,
        }
    }
}

/// Concentration summary of a weight vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub num_active: usize,
    /// Σ w², 1 for a single holding, 1/n for equal weights
    pub herfindahl: f64,
    pub max_weight: f64,
}

/// Performance statistics of one weight vector over the historical window.
/// Return and risk figures are annualized; CVaR is per period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSet {
    pub expected_return: f64,
    pub volatility: f64,
    pub variance: f64,
    /// 0 when volatility is 0 (see `zero_volatility`)
    pub sharpe_ratio: f64,
    /// 0 when downside deviation is 0 (see `zero_downside`)
    pub sortino_ratio: f64,
    /// Mean of the worst (1 − confidence) share of period returns
    pub cvar: f64,
    pub cvar_confidence: f64,
    pub cvar_99: f64,
    /// Largest peak-to-trough loss of the wealth path, as a positive fraction
    pub max_drawdown: f64,
    pub downside_deviation: f64,
    pub composition: Composition,
    /// Percentage of portfolio variance attributable to each asset
    pub risk_contributions: BTreeMap<AssetId, f64>,
    pub zero_volatility: bool,
    pub zero_downside: bool,
}

/// Metrics calculator
#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator {
    config: MetricsConfig,
}

impl MetricsCalculator {
    pub fn new(config: MetricsConfig) -> Self {
        MetricsCalculator { config }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Evaluate `weights` against `returns`. Pure and deterministic.
    pub fn compute(&self, weights: &WeightVector, returns: &ReturnSeries) -> Result<MetricsSet> {
        let cfg = &self.config;
        if !(cfg.cvar_confidence > 0.0 && cfg.cvar_confidence < 1.0) {
            return Err(QfolioError::InvalidInput(format!(
                "CVaR confidence must be in (0, 1), got {}",
                cfg.cvar_confidence
            )));
        }
        if !cfg.risk_free_rate.is_finite() {
            return Err(QfolioError::InvalidInput(
                "risk-free rate must be finite".to_string(),
            ));
        }

        let moments = compute_moments_annualized(returns, cfg.annualization)?;
        let aligned = weights.aligned_to(returns.assets())?;
        let w = DVector::from_column_slice(&aligned);

        let expected_return = moments.expected_return(&w);
        let variance = moments.variance(&w).max(0.0);
        let volatility = variance.sqrt();
        let zero_volatility = volatility <= DEGENERATE_EPS;
        let sharpe_ratio = if zero_volatility {
            0.0
        } else {
            (expected_return - cfg.risk_free_rate) / volatility
        };

        let series = returns.portfolio_returns(&aligned);

        let downside_deviation = downside_deviation(&series) * cfg.annualization.sqrt();
        let zero_downside = downside_deviation <= DEGENERATE_EPS;
        let sortino_ratio = if zero_downside {
            0.0
        } else {
            (expected_return - cfg.risk_free_rate) / downside_deviation
        };

        let growth: Vec<f64> = series.iter().map(|r| returns.kind().growth(*r)).collect();

        let sigma_w = moments.sigma() * &w;
        let risk_contributions = if zero_volatility {
            BTreeMap::new()
        } else {
            returns
                .assets()
                .iter()
                .enumerate()
                .map(|(i, asset)| (asset.clone(), 100.0 * w[i] * sigma_w[i] / variance))
                .collect()
        };

        Ok(MetricsSet {
            expected_return,
            volatility,
            variance,
            sharpe_ratio,
            sortino_ratio,
            cvar: cvar(&series, cfg.cvar_confidence),
            cvar_confidence: cfg.cvar_confidence,
            cvar_99: cvar(&series, 0.99),
            max_drawdown: max_drawdown(&growth),
            downside_deviation,
            composition: composition(&aligned),
            risk_contributions,
            zero_volatility,
            zero_downside,
        })
    }
}

/// Metrics with the default configuration
pub fn compute_metrics(weights: &WeightVector, returns: &ReturnSeries) -> Result<MetricsSet> {
    MetricsCalculator::default().compute(weights, returns)
}

/// Average of the worst ⌈(1 − confidence)·T⌉ period returns (at least one)
fn cvar(series: &[f64], confidence: f64) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    // Shave rounding noise so 5% of 20 is one period, not two
    let raw = (1.0 - confidence) * sorted.len() as f64 - 1e-9;
    let tail = (raw.ceil().max(1.0) as usize).min(sorted.len());
    sorted[..tail].iter().sum::<f64>() / tail as f64
}

/// Population standard deviation of the negative period returns
fn downside_deviation(series: &[f64]) -> f64 {
    let negative: Vec<f64> = series.iter().copied().filter(|r| *r < 0.0).collect();
    if negative.is_empty() {
        return 0.0;
    }
    let mean = negative.iter().sum::<f64>() / negative.len() as f64;
    let var = negative.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / negative.len() as f64;
    var.sqrt()
}

/// Wealth starts at 1 and compounds by each period's growth factor
fn max_drawdown(growth: &[f64]) -> f64 {
    let mut wealth = 1.0;
    let mut peak = 1.0;
    let mut worst: f64 = 0.0;
    for g in growth {
        wealth *= g;
        if wealth > peak {
            peak = wealth;
        }
        if peak > 0.0 {
            worst = worst.max((peak - wealth) / peak);
        }
    }
    worst
}

fn composition(weights: &[f64]) -> Composition {
    Composition {
        num_active: weights.iter().filter(|w| w.abs() > WEIGHT_TOLERANCE).count(),
        herfindahl: weights.iter().map(|w| w * w).sum(),
        max_weight: weights.iter().fold(0.0f64, |m, w| m.max(w.abs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cvar_tail_size() {
        let series: Vec<f64> = (1..=20).map(|i| i as f64 / 100.0 - 0.1).collect();
        // 5% of 20 = 1 worst return
        assert!((cvar(&series, 0.95) + 0.09).abs() < 1e-12);
        // 10% of 20 = 2 worst returns
        assert!((cvar(&series, 0.90) + 0.085).abs() < 1e-12);
    }

    #[test]
    fn test_drawdown_from_peak() {
        // 1 -> 1.2 -> 0.9 -> 1.0
        let growth = [1.2, 0.75, 1.0 / 0.9];
        assert!((max_drawdown(&growth) - 0.25).abs() < 1e-12);
        assert_eq!(max_drawdown(&[1.1, 1.1]), 0.0);
    }

    #[test]
    fn test_downside_uses_only_losses() {
        assert_eq!(downside_deviation(&[0.1, 0.2]), 0.0);
        // losses -0.1 and -0.3: mean -0.2, population std 0.1
        assert!((downside_deviation(&[-0.1, 0.5, -0.3]) - 0.1).abs() < 1e-12);
    }
}
