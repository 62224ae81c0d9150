use qfolio_types::QfolioError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::calculator::MetricsSet;

/// A single comparable figure of a [`MetricsSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ExpectedReturn,
    Volatility,
    #[default]
    SharpeRatio,
    SortinoRatio,
    Cvar,
    MaxDrawdown,
}

impl Metric {
    pub fn all() -> &'static [Metric] {
        &[
            Metric::ExpectedReturn,
            Metric::Volatility,
            Metric::SharpeRatio,
            Metric::SortinoRatio,
            Metric::Cvar,
            Metric::MaxDrawdown,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ExpectedReturn => "expected_return",
            Metric::Volatility => "volatility",
            Metric::SharpeRatio => "sharpe_ratio",
            Metric::SortinoRatio => "sortino_ratio",
            Metric::Cvar => "cvar",
            Metric::MaxDrawdown => "max_drawdown",
        }
    }

    pub fn value(&self, metrics: &MetricsSet) -> f64 {
        match self {
            Metric::ExpectedReturn => metrics.expected_return,
            Metric::Volatility => metrics.volatility,
            Metric::SharpeRatio => metrics.sharpe_ratio,
            Metric::SortinoRatio => metrics.sortino_ratio,
            Metric::Cvar => metrics.cvar,
            Metric::MaxDrawdown => metrics.max_drawdown,
        }
    }

    /// Volatility and drawdown are losses; CVaR is a (signed) tail return
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Metric::Volatility | Metric::MaxDrawdown)
    }

    /// Ordering that puts the better of two sets first
    pub fn compare(&self, a: &MetricsSet, b: &MetricsSet) -> Ordering {
        let ord = self.value(a).total_cmp(&self.value(b));
        if self.higher_is_better() {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Metric {
    type Err = QfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expected_return" | "return" => Ok(Metric::ExpectedReturn),
            "volatility" | "risk" => Ok(Metric::Volatility),
            "sharpe_ratio" | "sharpe" => Ok(Metric::SharpeRatio),
            "sortino_ratio" | "sortino" => Ok(Metric::SortinoRatio),
            "cvar" | "cvar_95" => Ok(Metric::Cvar),
            "max_drawdown" | "drawdown" => Ok(Metric::MaxDrawdown),
            other => Err(QfolioError::InvalidInput(format!("unknown metric: {}", other))),
        }
    }
}
