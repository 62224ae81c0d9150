use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::asset::AssetId;
use crate::error::{QfolioError, Result};

/// Weights with magnitude at or below this are treated as inactive
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Portfolio weights, one per asset, in the asset order of the moments they
/// were solved against. Serialized as an `asset_id -> weight` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<AssetId, f64>", try_from = "BTreeMap<AssetId, f64>")]
pub struct WeightVector {
    assets: Vec<AssetId>,
    values: Vec<f64>,
}

impl WeightVector {
    pub fn new(assets: Vec<AssetId>, values: Vec<f64>) -> Result<Self> {
        if assets.len() != values.len() {
            return Err(QfolioError::AssetMismatch(format!(
                "{} weights for {} assets",
                values.len(),
                assets.len()
            )));
        }
        if values.iter().any(|w| !w.is_finite()) {
            return Err(QfolioError::InvalidInput(
                "weights must be finite".to_string(),
            ));
        }
        Ok(WeightVector { assets, values })
    }

    pub fn zeros(assets: Vec<AssetId>) -> Self {
        let values = vec![0.0; assets.len()];
        WeightVector { assets, values }
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, asset: &AssetId) -> Option<f64> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, f64)> {
        self.assets.iter().zip(self.values.iter().copied())
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Number of weights with |w| above `tolerance`
    pub fn active_count(&self, tolerance: f64) -> usize {
        self.values.iter().filter(|w| w.abs() > tolerance).count()
    }

    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0, |acc, w| acc.max(w.abs()))
    }

    /// Reorder into the given asset order. Assets absent here get weight 0;
    /// weights on assets outside `order` are an error.
    pub fn aligned_to(&self, order: &[AssetId]) -> Result<Vec<f64>> {
        for (asset, w) in self.iter() {
            if w.abs() > WEIGHT_TOLERANCE && !order.contains(asset) {
                return Err(QfolioError::AssetMismatch(format!(
                    "weight on {} which is not in the return series",
                    asset
                )));
            }
        }
        Ok(order
            .iter()
            .map(|a| self.get(a).unwrap_or(0.0))
            .collect())
    }

    /// Capital allocated to each asset for a given budget
    pub fn allocation(&self, budget: f64) -> BTreeMap<AssetId, f64> {
        self.iter().map(|(a, w)| (a.clone(), w * budget)).collect()
    }
}

impl From<WeightVector> for BTreeMap<AssetId, f64> {
    fn from(weights: WeightVector) -> Self {
        weights.assets.into_iter().zip(weights.values).collect()
    }
}

impl TryFrom<BTreeMap<AssetId, f64>> for WeightVector {
    type Error = QfolioError;

    fn try_from(map: BTreeMap<AssetId, f64>) -> Result<Self> {
        let (assets, values) = map.into_iter().unzip();
        WeightVector::new(assets, values)
    }
}
