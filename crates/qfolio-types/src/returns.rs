use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::asset::AssetId;
use crate::error::{QfolioError, Result};

/// One row of the dataset store's cleaned price table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub asset_id: AssetId,
    pub date: NaiveDate,
    pub adjusted_price: f64,
}

impl PriceRow {
    pub fn new(asset_id: impl Into<AssetId>, date: NaiveDate, adjusted_price: f64) -> Self {
        PriceRow {
            asset_id: asset_id.into(),
            date,
            adjusted_price,
        }
    }
}

/// How periodic returns are derived from consecutive prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// ln(p_t / p_{t-1})
    #[default]
    Log,
    /// p_t / p_{t-1} - 1
    Simple,
}

impl ReturnKind {
    pub fn from_prices(&self, previous: f64, current: f64) -> f64 {
        match self {
            ReturnKind::Log => (current / previous).ln(),
            ReturnKind::Simple => current / previous - 1.0,
        }
    }

    /// Wealth multiplier for one period with return `r`
    pub fn growth(&self, r: f64) -> f64 {
        match self {
            ReturnKind::Log => r.exp(),
            ReturnKind::Simple => 1.0 + r,
        }
    }
}

/// Date-aligned periodic returns, one column per asset.
///
/// Every observation row carries a value for every asset, so the aligned
/// window has no gaps by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    assets: Vec<AssetId>,
    dates: Vec<NaiveDate>,
    /// observations[t][i] = return of asset i over the period ending at dates[t]
    observations: Vec<Vec<f64>>,
    kind: ReturnKind,
}

impl ReturnSeries {
    pub fn new(
        assets: Vec<AssetId>,
        dates: Vec<NaiveDate>,
        observations: Vec<Vec<f64>>,
        kind: ReturnKind,
    ) -> Result<Self> {
        if assets.is_empty() {
            return Err(QfolioError::InvalidInput(
                "return series needs at least one asset".to_string(),
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        for asset in &assets {
            if !seen.insert(asset) {
                return Err(QfolioError::AssetMismatch(format!(
                    "asset {} appears more than once",
                    asset
                )));
            }
        }

        if dates.len() != observations.len() {
            return Err(QfolioError::InvalidInput(format!(
                "{} dates for {} observation rows",
                dates.len(),
                observations.len()
            )));
        }

        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(QfolioError::InvalidInput(
                "dates must be strictly increasing".to_string(),
            ));
        }

        for (date, row) in dates.iter().zip(observations.iter()) {
            if row.len() != assets.len() {
                return Err(QfolioError::AssetMismatch(format!(
                    "observation on {} has {} values for {} assets",
                    date,
                    row.len(),
                    assets.len()
                )));
            }
            if row.iter().any(|r| !r.is_finite()) {
                return Err(QfolioError::InvalidInput(format!(
                    "non-finite return on {}",
                    date
                )));
            }
        }

        Ok(ReturnSeries {
            assets,
            dates,
            observations,
            kind,
        })
    }

    /// Pivot a (asset, date, price) table into aligned returns.
    ///
    /// Assets are ordered by identifier. Fails when an asset is missing on
    /// some date, when an (asset, date) pair repeats, or when fewer than two
    /// distinct dates exist.
    pub fn from_prices(rows: &[PriceRow], kind: ReturnKind) -> Result<Self> {
        if rows.is_empty() {
            return Err(QfolioError::InsufficientData(
                "price table is empty".to_string(),
            ));
        }

        let mut by_date: BTreeMap<NaiveDate, BTreeMap<AssetId, f64>> = BTreeMap::new();
        let mut universe = std::collections::BTreeSet::new();

        for row in rows {
            if !row.adjusted_price.is_finite() || row.adjusted_price <= 0.0 {
                return Err(QfolioError::InvalidInput(format!(
                    "price for {} on {} must be positive and finite, got {}",
                    row.asset_id, row.date, row.adjusted_price
                )));
            }
            universe.insert(row.asset_id.clone());
            let day = by_date.entry(row.date).or_default();
            if day.insert(row.asset_id.clone(), row.adjusted_price).is_some() {
                return Err(QfolioError::AssetMismatch(format!(
                    "duplicate observation for {} on {}",
                    row.asset_id, row.date
                )));
            }
        }

        if by_date.len() < 2 {
            return Err(QfolioError::InsufficientData(format!(
                "need at least 2 distinct dates, got {}",
                by_date.len()
            )));
        }

        for (date, day) in &by_date {
            if day.len() != universe.len() {
                let missing: Vec<String> = universe
                    .iter()
                    .filter(|a| !day.contains_key(*a))
                    .map(|a| a.to_string())
                    .collect();
                return Err(QfolioError::AssetMismatch(format!(
                    "assets missing on {}: {}",
                    date,
                    missing.join(", ")
                )));
            }
        }

        let assets: Vec<AssetId> = universe.into_iter().collect();
        let days: Vec<(&NaiveDate, &BTreeMap<AssetId, f64>)> = by_date.iter().collect();

        let mut dates = Vec::with_capacity(days.len() - 1);
        let mut observations = Vec::with_capacity(days.len() - 1);
        for pair in days.windows(2) {
            let (_, prev) = pair[0];
            let (date, curr) = pair[1];
            let row = assets
                .iter()
                .map(|a| kind.from_prices(prev[a], curr[a]))
                .collect();
            dates.push(*date);
            observations.push(row);
        }

        ReturnSeries::new(assets, dates, observations, kind)
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn observations(&self) -> &[Vec<f64>] {
        &self.observations
    }

    pub fn kind(&self) -> ReturnKind {
        self.kind
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn num_observations(&self) -> usize {
        self.observations.len()
    }

    pub fn asset_index(&self, asset: &AssetId) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    /// Returns of a single asset through time
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.observations.iter().map(|row| row[index]).collect()
    }

    /// Per-period portfolio returns for fixed weights aligned to `assets()`
    pub fn portfolio_returns(&self, weights: &[f64]) -> Vec<f64> {
        self.observations
            .iter()
            .map(|row| row.iter().zip(weights).map(|(r, w)| r * w).sum())
            .collect()
    }
}
