//! Feasibility aggregation
//!
//! Turns per-parameter feasibility scores into a single overall verdict.
//! The policy is a trait seam so a deployment can swap the weighting without
//! touching the coordinator.

use crate::pipeline::types::{FeasibilityAggregate, FeasibilityScore};
use std::collections::HashMap;
use tracing::warn;

/// Aggregates per-parameter scores into an overall feasibility verdict
pub trait ScoringPolicy: Send + Sync {
    fn aggregate(&self, scores: &[FeasibilityScore], threshold: f64) -> FeasibilityAggregate;
}

/// Weighted average over the configured parameter weights. Weights are
/// normalized over the parameters actually present in the input, so a missing
/// parameter redistributes its weight instead of dragging the score down.
pub struct WeightedAverage {
    weights: HashMap<String, f64>,
}

impl WeightedAverage {
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self { weights }
    }
}

impl ScoringPolicy for WeightedAverage {
    fn aggregate(&self, scores: &[FeasibilityScore], threshold: f64) -> FeasibilityAggregate {
        if scores.is_empty() {
            return FeasibilityAggregate::new(0.0, threshold);
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for score in scores {
            match self.weights.get(&score.parameter) {
                Some(weight) => {
                    weighted_sum += weight * score.score;
                    weight_total += weight;
                }
                None => warn!(
                    "No weight configured for feasibility parameter '{}', ignoring it",
                    score.parameter
                ),
            }
        }

        let overall = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            // Nothing matched the weight table; fall back to a plain average.
            scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64
        };

        FeasibilityAggregate::new(overall, threshold)
    }
}
