//! Checkpoint and axis domain models.
//!
//! A checkpoint is the atomic evaluation criterion produced by the evaluator.
//! Checkpoints belong to exactly one of five fixed quality axes, and the
//! axes are combined through a shared weight map into the greenlight score.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum score a single checkpoint can carry.
pub const MAX_CHECKPOINT_SCORE: f64 = 10.0;

/// Tolerance used when checking that axis weights sum to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// One of the five fixed quality dimensions a treatment is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Axis {
    Originality,
    CharacterDepth,
    Pacing,
    GenreFidelity,
    CommercialViability,
}

impl Axis {
    /// All axes in their canonical display order.
    pub const ALL: [Self; 5] = [
        Self::Originality,
        Self::CharacterDepth,
        Self::Pacing,
        Self::GenreFidelity,
        Self::CommercialViability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Originality => "originality",
            Self::CharacterDepth => "characterDepth",
            Self::Pacing => "pacing",
            Self::GenreFidelity => "genreFidelity",
            Self::CommercialViability => "commercialViability",
        }
    }

    /// Parse an axis identifier, accepting both the wire form
    /// (`characterDepth`) and the snake form (`character_depth`).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "originality" => Some(Self::Originality),
            "characterdepth" => Some(Self::CharacterDepth),
            "pacing" => Some(Self::Pacing),
            "genrefidelity" => Some(Self::GenreFidelity),
            "commercialviability" => Some(Self::CommercialViability),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Originality => "Originality",
            Self::CharacterDepth => "Character Depth",
            Self::Pacing => "Pacing",
            Self::GenreFidelity => "Genre Fidelity",
            Self::CommercialViability => "Commercial Viability",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-axis weights used to combine axis scores into the overall score.
///
/// Weights are expected to sum to 1.0, but out-of-range vectors are not
/// rejected here; the aggregator clamps the final score instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AxisWeights {
    #[serde(default = "default_weight")]
    pub originality: f64,
    #[serde(default = "default_weight")]
    pub character_depth: f64,
    #[serde(default = "default_weight")]
    pub pacing: f64,
    #[serde(default = "default_weight")]
    pub genre_fidelity: f64,
    #[serde(default = "default_weight")]
    pub commercial_viability: f64,
}

const fn default_weight() -> f64 {
    0.2
}

impl Default for AxisWeights {
    fn default() -> Self {
        Self {
            originality: default_weight(),
            character_depth: default_weight(),
            pacing: default_weight(),
            genre_fidelity: default_weight(),
            commercial_viability: default_weight(),
        }
    }
}

impl AxisWeights {
    /// Weight assigned to the given axis.
    pub const fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Originality => self.originality,
            Axis::CharacterDepth => self.character_depth,
            Axis::Pacing => self.pacing,
            Axis::GenreFidelity => self.genre_fidelity,
            Axis::CommercialViability => self.commercial_viability,
        }
    }

    pub fn sum(&self) -> f64 {
        Axis::ALL.iter().map(|a| self.get(*a)).sum()
    }

    /// Whether the weights sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`].
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }
}

/// A single evaluation criterion result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub axis_id: Axis,
    pub passed: bool,
    /// Gradient score in `[0, 10]`. When absent the pass flag decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Checkpoint {
    pub fn new(id: impl Into<String>, axis_id: Axis, passed: bool) -> Self {
        Self {
            id: id.into(),
            axis_id,
            passed,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Effective score: the gradient score if present, otherwise 10 for a
    /// pass and 0 for a fail.
    pub fn effective_score(&self) -> f64 {
        self.score.unwrap_or(if self.passed { MAX_CHECKPOINT_SCORE } else { 0.0 })
    }
}

/// Authoritative checkpoint results keyed by axis, then checkpoint id.
///
/// Replaced wholesale on every successful authoritative evaluation.
pub type CheckpointResults = BTreeMap<Axis, BTreeMap<String, Checkpoint>>;

/// A locally asserted, unverified checkpoint result created when a fix is
/// applied, pending confirmation from the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointOverride {
    pub checkpoint_id: String,
    pub axis_id: Axis,
    pub override_passed: bool,
    pub override_score: f64,
}

impl CheckpointOverride {
    /// Conservative "likely fixed" estimate for a checkpoint.
    pub fn likely_fixed(checkpoint_id: impl Into<String>, axis_id: Axis, score: f64) -> Self {
        Self {
            checkpoint_id: checkpoint_id.into(),
            axis_id,
            override_passed: true,
            override_score: score,
        }
    }

    /// Whether this override targets the given checkpoint.
    pub fn matches(&self, checkpoint_id: &str, axis_id: Axis) -> bool {
        self.axis_id == axis_id && self.checkpoint_id == checkpoint_id
    }
}

/// Flattened key used when checkpoint scores are sent back to the evaluator.
pub fn checkpoint_key(axis: Axis, checkpoint_id: &str) -> String {
    format!("{}.{}", axis.as_str(), checkpoint_id)
}
