//! Federated averaging (FedAvg) — pure computation over client updates.
//!
//! Stateless: every function operates only on its inputs, so the
//! coordinator can call it inline while holding the round lock without
//! any reentrancy concerns. All accumulation is f64 end to end.

use std::collections::HashMap;

use crate::error::{FedError, Result};
use crate::weights::WeightSet;

/// One client's weight contribution to a round.
#[derive(Debug, Clone)]
pub struct ClientContribution {
    pub client_id: String,
    pub weights: WeightSet,
    /// Contribution weight (dataset cardinality).
    pub size: u64,
}

/// One client's metric contribution to a round.
#[derive(Debug, Clone)]
pub struct MetricsContribution {
    pub size: u64,
    pub metrics: HashMap<String, f64>,
}

/// Combine client weight sets into one global set.
///
/// When `weighted`, each contribution is scaled by `size / Σ size`;
/// otherwise every contribution gets `1 / n`. Fails on an empty input,
/// any per-layer shape mismatch against the first contribution, or a
/// zero total size in weighted mode.
pub fn federated_average(
    contributions: &[ClientContribution],
    weighted: bool,
) -> Result<WeightSet> {
    let first = contributions
        .first()
        .ok_or_else(|| FedError::Aggregation("no updates to aggregate".to_string()))?;

    for c in &contributions[1..] {
        if !c.weights.shape_matches(&first.weights) {
            return Err(FedError::Aggregation(format!(
                "shape mismatch: update from {} does not match update from {}",
                c.client_id, first.client_id
            )));
        }
    }

    let total_size: u64 = contributions.iter().map(|c| c.size).sum();
    if weighted && total_size == 0 {
        return Err(FedError::Aggregation(
            "total contribution size is zero".to_string(),
        ));
    }
    let uniform = 1.0 / contributions.len() as f64;

    let mut result = WeightSet::new(
        first
            .weights
            .layers()
            .iter()
            .map(|t| t.zeros_like())
            .collect(),
    );

    for c in contributions {
        let factor = if weighted {
            c.size as f64 / total_size as f64
        } else {
            uniform
        };
        for (acc, layer) in result.0.iter_mut().zip(c.weights.layers()) {
            // Shapes validated above.
            acc.add_scaled(layer, factor);
        }
    }

    Ok(result)
}

/// Aggregate per-client training metrics with the same weighting scheme.
///
/// A key absent from some update contributes 0 for that update; an empty
/// input yields an empty map rather than an error.
pub fn compute_metrics(
    contributions: &[MetricsContribution],
    weighted: bool,
) -> HashMap<String, f64> {
    if contributions.is_empty() {
        return HashMap::new();
    }

    let total_size: u64 = contributions.iter().map(|c| c.size).sum();
    let uniform = 1.0 / contributions.len() as f64;
    let mut aggregated: HashMap<String, f64> = HashMap::new();

    for c in contributions {
        let factor = if weighted && total_size > 0 {
            c.size as f64 / total_size as f64
        } else {
            uniform
        };
        for (name, value) in &c.metrics {
            *aggregated.entry(name.clone()).or_insert(0.0) += value * factor;
        }
    }

    aggregated
}

/// True iff every layer's mean absolute elementwise difference between the
/// old and new weights is below `threshold`. Absent or mismatched inputs
/// are reported as not-converged, never as an error.
pub fn check_convergence(
    old: Option<&WeightSet>,
    new: Option<&WeightSet>,
    threshold: f64,
) -> bool {
    let (Some(old), Some(new)) = (old, new) else {
        return false;
    };
    if !old.shape_matches(new) || old.layer_count() == 0 {
        return false;
    }
    old.layers()
        .iter()
        .zip(new.layers())
        .all(|(a, b)| matches!(a.mean_abs_diff(b), Some(diff) if diff < threshold))
}
