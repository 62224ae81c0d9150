use qfolio_types::{AssetId, Constraints};

/// One-hot bucket encoding of per-asset weights.
///
/// Asset `i` owns `levels` binary variables; variable `i * levels + j`
/// selects the weight `cap * j / (levels - 1)`, so bucket 0 means "not held"
/// and the last bucket sits at the weight cap. Encodings are long-only.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryEncoding {
    assets: Vec<AssetId>,
    levels: Vec<f64>,
}

impl BinaryEncoding {
    pub fn new(assets: Vec<AssetId>, constraints: &Constraints) -> Self {
        let k = constraints.discretization_levels();
        let cap = constraints.max_weight_per_asset();
        let levels = (0..k).map(|j| cap * j as f64 / (k - 1) as f64).collect();
        BinaryEncoding { assets, levels }
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    /// Weight values selectable per asset, ascending from 0
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn levels_per_asset(&self) -> usize {
        self.levels.len()
    }

    pub fn num_variables(&self) -> usize {
        self.assets.len() * self.levels.len()
    }

    pub fn index(&self, asset: usize, bucket: usize) -> usize {
        asset * self.levels.len() + bucket
    }

    /// (asset, bucket) owning a variable index
    pub fn position(&self, variable: usize) -> (usize, usize) {
        let k = self.levels.len();
        (variable / k, variable % k)
    }

    /// Weight contributed by a variable when set
    pub fn weight_of(&self, variable: usize) -> f64 {
        self.levels[variable % self.levels.len()]
    }
}
