use qfolio_types::Constraints;

use crate::encoding::BinaryEncoding;

/// Raw per-asset weights read back from a bit assignment
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedWeights {
    pub values: Vec<f64>,
    /// Assets whose bucket group does not have exactly one bit set
    pub one_hot_violations: usize,
}

/// Map bits back to weights. Each asset takes the level of its first set
/// bucket; an asset with no set bucket gets weight 0.
pub fn decode_assignment(encoding: &BinaryEncoding, x: &[bool]) -> DecodedWeights {
    let k = encoding.levels_per_asset();
    let mut values = Vec::with_capacity(encoding.num_assets());
    let mut one_hot_violations = 0;

    for i in 0..encoding.num_assets() {
        let group = &x[i * k..(i + 1) * k];
        let set = group.iter().filter(|b| **b).count();
        if set != 1 {
            one_hot_violations += 1;
        }
        let weight = group
            .iter()
            .position(|b| *b)
            .map_or(0.0, |bucket| encoding.levels()[bucket]);
        values.push(weight);
    }

    DecodedWeights {
        values,
        one_hot_violations,
    }
}

/// Weights after cardinality selection, renormalization and cap repair
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedWeights {
    pub values: Vec<f64>,
    /// False when the repair could not satisfy the budget and caps together
    pub feasible: bool,
}

/// Project decoded (non-negative) weights onto the constraint set: keep the
/// `max_assets` largest, rescale to sum to 1, then clamp to the cap and
/// spread the excess over the remaining held assets.
pub fn finalize_weights(raw: &[f64], constraints: &Constraints) -> FinalizedWeights {
    let cap = constraints.max_weight_per_asset();
    let mut values: Vec<f64> = raw.iter().map(|w| w.max(0.0)).collect();

    let mut held: Vec<usize> = (0..values.len()).filter(|&i| values[i] > 0.0).collect();
    if held.len() > constraints.max_assets() {
        held.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
        for &i in &held[constraints.max_assets()..] {
            values[i] = 0.0;
        }
        held.truncate(constraints.max_assets());
    }

    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return FinalizedWeights {
            values,
            feasible: false,
        };
    }
    values.iter_mut().for_each(|w| *w /= total);

    // Water-fill down to the cap
    let mut capped = vec![false; values.len()];
    loop {
        let mut excess = 0.0;
        for &i in &held {
            if values[i] > cap {
                excess += values[i] - cap;
                values[i] = cap;
                capped[i] = true;
            }
        }
        if excess <= 1e-15 {
            break;
        }

        let free: f64 = held.iter().filter(|&&i| !capped[i]).map(|&i| values[i]).sum();
        if free <= 0.0 {
            return FinalizedWeights {
                values,
                feasible: false,
            };
        }
        for &i in held.iter().filter(|&&i| !capped[i]) {
            values[i] += excess * values[i] / free;
        }
    }

    FinalizedWeights {
        values,
        feasible: true,
    }
}
