use chrono::NaiveDate;
use qfolio_types::{AssetId, PriceRow, Result, ReturnKind, ReturnSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Dataset store: supplies cleaned price tables by name
pub trait DatasetSource {
    /// Price rows of `dataset`, restricted to `assets` (all assets when empty)
    fn price_rows(&self, dataset: &str, assets: &[AssetId]) -> Result<Vec<PriceRow>>;

    /// Date-aligned returns derived from the price rows
    fn return_series(&self, dataset: &str, assets: &[AssetId], kind: ReturnKind) -> Result<ReturnSeries> {
        let rows = self.price_rows(dataset, assets)?;
        ReturnSeries::from_prices(&rows, kind)
    }
}

/// Shape of a price table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub num_rows: usize,
    pub num_assets: usize,
    pub assets: Vec<AssetId>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl DatasetSummary {
    pub fn from_rows(rows: &[PriceRow]) -> Self {
        let assets: BTreeSet<AssetId> = rows.iter().map(|r| r.asset_id.clone()).collect();
        DatasetSummary {
            num_rows: rows.len(),
            num_assets: assets.len(),
            assets: assets.into_iter().collect(),
            first_date: rows.iter().map(|r| r.date).min(),
            last_date: rows.iter().map(|r| r.date).max(),
        }
    }
}
