mod calculator;
mod metric;

pub use calculator::{compute_metrics, Composition, MetricsCalculator, MetricsConfig, MetricsSet};
pub use metric::Metric;
