//! Checkpoint aggregation.
//!
//! Turns checkpoint-level results, pending optimistic overrides and the
//! shared weight map into per-axis scores and the overall greenlight score.
//! Everything here is pure: identical input always yields identical output.

use serde::{Deserialize, Serialize};

use crate::domain::models::{
    checkpoint_key, Axis, AxisScore, AxisWeights, Checkpoint, CheckpointOverride,
    CheckpointResults, GreenlightScore, MAX_CHECKPOINT_SCORE,
};

/// Result of aggregating checkpoint results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub axes: Vec<AxisScore>,
    pub greenlight_score: GreenlightScore,
}

impl AggregateResult {
    pub fn axis(&self, axis: Axis) -> Option<&AxisScore> {
        self.axes.iter().find(|a| a.axis == axis)
    }
}

/// A checkpoint's effective result after overrides are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveCheckpoint<'a> {
    pub checkpoint: &'a Checkpoint,
    pub score: f64,
    pub passed: bool,
    pub overridden: bool,
}

/// Find the override for a checkpoint, if any.
fn find_override<'a>(
    overrides: &'a [CheckpointOverride],
    checkpoint: &Checkpoint,
    axis: Axis,
) -> Option<&'a CheckpointOverride> {
    overrides.iter().find(|o| o.matches(&checkpoint.id, axis))
}

/// Effective results of every known checkpoint of one axis.
///
/// Only checkpoints present in the authoritative results are considered;
/// overrides for unknown checkpoints are ignored.
pub fn effective_checkpoints<'a>(
    results: &'a CheckpointResults,
    overrides: &[CheckpointOverride],
    axis: Axis,
) -> Vec<EffectiveCheckpoint<'a>> {
    results
        .get(&axis)
        .map(|checkpoints| {
            checkpoints
                .values()
                .map(|checkpoint| match find_override(overrides, checkpoint, axis) {
                    Some(o) => EffectiveCheckpoint {
                        checkpoint,
                        score: o.override_score,
                        passed: o.override_passed,
                        overridden: true,
                    },
                    None => EffectiveCheckpoint {
                        checkpoint,
                        score: checkpoint.effective_score(),
                        passed: checkpoint.passed,
                        overridden: false,
                    },
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Score a single axis.
///
/// An axis with no known checkpoints scores 0 and is flagged as having
/// insufficient data rather than dividing by zero.
pub fn score_axis(
    results: &CheckpointResults,
    overrides: &[CheckpointOverride],
    axis: Axis,
    weight: f64,
) -> AxisScore {
    let effective = effective_checkpoints(results, overrides, axis);
    if effective.is_empty() {
        return AxisScore {
            axis,
            score: 0,
            weight,
            insufficient_data: true,
        };
    }

    let total: f64 = effective.iter().map(|e| e.score).sum();
    let max_total = MAX_CHECKPOINT_SCORE * effective.len() as f64;
    let score = (100.0 * total / max_total).round().clamp(0.0, 100.0) as u32;

    AxisScore {
        axis,
        score,
        weight,
        insufficient_data: false,
    }
}

/// Aggregate checkpoint results into axis scores and the overall score.
///
/// The overall score is the weighted sum of axis scores, rounded and
/// clamped to `[0, 100]`; out-of-range weight vectors are tolerated.
/// `confidence` is passed through unchanged.
pub fn aggregate(
    results: &CheckpointResults,
    overrides: &[CheckpointOverride],
    weights: &AxisWeights,
    confidence: f64,
) -> AggregateResult {
    let axes: Vec<AxisScore> = Axis::ALL
        .iter()
        .map(|axis| score_axis(results, overrides, *axis, weights.get(*axis)))
        .collect();

    let weighted: f64 = axes.iter().map(|a| f64::from(a.score) * a.weight).sum();
    let overall = weighted.round().clamp(0.0, 100.0) as u32;

    AggregateResult {
        axes,
        greenlight_score: GreenlightScore::new(overall, confidence),
    }
}

/// Flattened `axis.checkpoint -> effective score` map with overrides applied.
pub fn flatten_effective_scores(
    results: &CheckpointResults,
    overrides: &[CheckpointOverride],
) -> Vec<(String, f64, bool)> {
    Axis::ALL
        .iter()
        .flat_map(|axis| {
            effective_checkpoints(results, overrides, *axis)
                .into_iter()
                .map(move |e| (checkpoint_key(*axis, &e.checkpoint.id), e.score, e.passed))
        })
        .collect()
}
