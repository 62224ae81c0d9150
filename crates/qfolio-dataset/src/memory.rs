use qfolio_types::{AssetId, PriceRow, QfolioError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use crate::source::{DatasetSource, DatasetSummary};

/// In-memory dataset store keyed by dataset name
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    datasets: BTreeMap<String, Vec<PriceRow>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a single named table
    pub fn with_rows(name: impl Into<String>, rows: Vec<PriceRow>) -> Self {
        let mut store = Self::new();
        store.insert(name, rows);
        store
    }

    /// Add or replace a table
    pub fn insert(&mut self, name: impl Into<String>, rows: Vec<PriceRow>) {
        self.datasets.insert(name.into(), rows);
    }

    /// Load a JSON array of `{asset_id, date, adjusted_price}` rows
    pub fn load_json<R: Read>(&mut self, name: impl Into<String>, reader: R) -> Result<usize> {
        let rows: Vec<PriceRow> = serde_json::from_reader(reader)?;
        let count = rows.len();
        self.insert(name, rows);
        Ok(count)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(|k| k.as_str())
    }

    pub fn summary(&self, dataset: &str) -> Result<DatasetSummary> {
        Ok(DatasetSummary::from_rows(self.table(dataset)?))
    }

    pub fn remove(&mut self, dataset: &str) -> Option<Vec<PriceRow>> {
        self.datasets.remove(dataset)
    }

    fn table(&self, dataset: &str) -> Result<&Vec<PriceRow>> {
        self.datasets
            .get(dataset)
            .ok_or_else(|| QfolioError::InvalidInput(format!("unknown dataset: {}", dataset)))
    }
}

impl DatasetSource for MemoryDataset {
    fn price_rows(&self, dataset: &str, assets: &[AssetId]) -> Result<Vec<PriceRow>> {
        let table = self.table(dataset)?;
        if assets.is_empty() {
            return Ok(table.clone());
        }

        let wanted: BTreeSet<&AssetId> = assets.iter().collect();
        let rows: Vec<PriceRow> = table
            .iter()
            .filter(|r| wanted.contains(&r.asset_id))
            .cloned()
            .collect();

        let present: BTreeSet<&AssetId> = rows.iter().map(|r| &r.asset_id).collect();
        if let Some(missing) = wanted.iter().find(|a| !present.contains(**a)) {
            return Err(QfolioError::AssetMismatch(format!(
                "asset {} not in dataset {}",
                missing, dataset
            )));
        }

        Ok(rows)
    }
}
