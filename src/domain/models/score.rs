//! Greenlight score domain model.

use serde::{Deserialize, Serialize};

use super::checkpoint::Axis;

/// Scores at or above this value are classified as market ready.
pub const MARKET_READY_MIN: u32 = 90;

/// Scores at or above this value (and below market ready) show strong potential.
pub const STRONG_POTENTIAL_MIN: u32 = 70;

/// Tier classification of an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreTier {
    MarketReady,
    StrongPotential,
    NeedsRefinement,
}

impl ScoreTier {
    /// Classify an overall score.
    pub const fn for_score(score: u32) -> Self {
        if score >= MARKET_READY_MIN {
            Self::MarketReady
        } else if score >= STRONG_POTENTIAL_MIN {
            Self::StrongPotential
        } else {
            Self::NeedsRefinement
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarketReady => "market-ready",
            Self::StrongPotential => "strong-potential",
            Self::NeedsRefinement => "needs-refinement",
        }
    }
}

/// The single 0-100 overall quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GreenlightScore {
    pub score: u32,
    /// Evaluator confidence in `[0, 1]`.
    pub confidence: f64,
    pub tier: ScoreTier,
}

impl GreenlightScore {
    /// Build a score, clamping to `[0, 100]` and deriving the tier.
    pub fn new(score: u32, confidence: f64) -> Self {
        let score = score.min(100);
        Self {
            score,
            confidence: confidence.clamp(0.0, 1.0),
            tier: ScoreTier::for_score(score),
        }
    }
}

/// Score for one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisScore {
    pub axis: Axis,
    pub score: u32,
    pub weight: f64,
    /// Set when the axis had no known checkpoints to score.
    #[serde(default)]
    pub insufficient_data: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ScoreTier::for_score(100), ScoreTier::MarketReady);
        assert_eq!(ScoreTier::for_score(90), ScoreTier::MarketReady);
        assert_eq!(ScoreTier::for_score(89), ScoreTier::StrongPotential);
        assert_eq!(ScoreTier::for_score(70), ScoreTier::StrongPotential);
        assert_eq!(ScoreTier::for_score(69), ScoreTier::NeedsRefinement);
        assert_eq!(ScoreTier::for_score(0), ScoreTier::NeedsRefinement);
    }

    #[test]
    fn test_new_clamps_score_and_confidence() {
        let score = GreenlightScore::new(140, 1.7);
        assert_eq!(score.score, 100);
        assert!((score.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(score.tier, ScoreTier::MarketReady);
    }

    #[test]
    fn test_tier_wire_format() {
        let json = serde_json::to_string(&ScoreTier::StrongPotential).unwrap();
        assert_eq!(json, "\"strong-potential\"");
    }
}
