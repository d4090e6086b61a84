//! Analysis session domain model.
//!
//! [`AnalysisState`] is the aggregate root of the refinement loop: one exists
//! per content identifier, created lazily, mutated only by the refinement
//! loop controller and fully cleared on reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::checkpoint::{Axis, AxisWeights, CheckpointOverride, CheckpointResults};
use super::intent::{Intent, TargetProfile};
use super::score::{AxisScore, GreenlightScore};

/// Classification of an evaluator insight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Strength,
    #[default]
    Weakness,
    Opportunity,
}

/// An opaque observation produced by the evaluator, optionally carrying a
/// fix instruction scoped to one section of the treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub id: String,
    #[serde(default)]
    pub kind: InsightKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_id: Option<Axis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_section: Option<String>,
}

impl Insight {
    /// Fix instruction and target section, when both are present.
    pub fn fix_instruction(&self) -> Option<(&str, &str)> {
        let suggestion = self.fix_suggestion.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let section = self.fix_section.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((section, suggestion))
    }

    pub fn is_actionable(&self) -> bool {
        self.fix_instruction().is_some()
    }

    /// The checkpoint this insight is about, when it names one.
    pub fn checkpoint_target(&self) -> Option<(&str, Axis)> {
        match (&self.checkpoint_id, self.axis_id) {
            (Some(id), Some(axis)) if !id.is_empty() => Some((id.as_str(), axis)),
            _ => None,
        }
    }
}

/// Authoritative analysis returned by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub greenlight_score: GreenlightScore,
    #[serde(default)]
    pub axes: Vec<AxisScore>,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub checkpoint_results: CheckpointResults,
    #[serde(default)]
    pub credits_used: u32,
}

impl Analysis {
    pub fn score(&self) -> u32 {
        self.greenlight_score.score
    }

    pub fn insight(&self, id: &str) -> Option<&Insight> {
        self.insights.iter().find(|i| i.id == id)
    }
}

/// Permanent audit record of a fix applied to the treatment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFix {
    pub id: Uuid,
    /// Insight the fix came from.
    pub insight_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis_id: Option<Axis>,
    pub section: String,
    pub fix_text: String,
    pub applied_at: DateTime<Utc>,
}

impl AppliedFix {
    pub fn from_insight(insight: &Insight, section: &str, fix_text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            insight_id: insight.id.clone(),
            checkpoint_id: insight.checkpoint_id.clone(),
            axis_id: insight.axis_id,
            section: section.to_string(),
            fix_text: fix_text.to_string(),
            applied_at: Utc::now(),
        }
    }
}

/// Observable phase of the refinement loop for one content identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    /// No analysis yet.
    Idle,
    /// An evaluator call is outstanding.
    Analyzing,
    /// Analysis available, below the ready threshold, iterations remaining.
    Analyzed,
    /// Score reached the ready threshold. Terminal until reset.
    ReadyForProduction,
    /// Iteration budget spent without reaching the threshold. Terminal until reset.
    Exhausted,
}

impl LoopPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::ReadyForProduction => "ready_for_production",
            Self::Exhausted => "exhausted",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ReadyForProduction | Self::Exhausted)
    }
}

/// Aggregate root of one analysis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisState {
    #[serde(default)]
    pub intent: Intent,
    #[serde(default)]
    pub analysis: Option<Analysis>,
    /// Score of the most recent authoritative analysis. Survives retargeting
    /// resets as a content-quality baseline; cleared only by a full reset.
    #[serde(default)]
    pub previous_score: Option<u32>,
    /// Ids of insights whose fixes were applied.
    #[serde(default)]
    pub applied_fixes: Vec<String>,
    #[serde(default)]
    pub applied_fix_details: Vec<AppliedFix>,
    #[serde(default)]
    pub iteration_count: u32,
    #[serde(default)]
    pub is_ready_for_production: bool,
    #[serde(default)]
    pub pending_fixes_count: u32,
    #[serde(default)]
    pub server_checkpoint_results: CheckpointResults,
    #[serde(default)]
    pub checkpoint_overrides: Vec<CheckpointOverride>,
    #[serde(default)]
    pub is_score_estimated: bool,
    #[serde(default)]
    pub has_intent_lock: bool,
    #[serde(default)]
    pub target_profile: Option<TargetProfile>,
    #[serde(default)]
    pub weights: AxisWeights,
    /// Digest of the treatment as last analysed.
    #[serde(default)]
    pub content_fingerprint: Option<String>,
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self::new(AxisWeights::default())
    }
}

impl AnalysisState {
    pub fn new(weights: AxisWeights) -> Self {
        Self {
            intent: Intent::default(),
            analysis: None,
            previous_score: None,
            applied_fixes: Vec::new(),
            applied_fix_details: Vec::new(),
            iteration_count: 0,
            is_ready_for_production: false,
            pending_fixes_count: 0,
            server_checkpoint_results: CheckpointResults::new(),
            checkpoint_overrides: Vec::new(),
            is_score_estimated: false,
            has_intent_lock: false,
            target_profile: None,
            weights,
            content_fingerprint: None,
        }
    }

    /// Current displayed score, if analysed.
    pub fn score(&self) -> Option<u32> {
        self.analysis.as_ref().map(Analysis::score)
    }

    /// Whether the fix for the given insight was already applied.
    pub fn is_fix_applied(&self, insight_id: &str) -> bool {
        self.applied_fixes.iter().any(|id| id == insight_id)
    }

    /// Derive the settled phase of the loop (never `Analyzing`; that is
    /// reported by the controller while a call is outstanding).
    pub fn phase(&self, max_iterations: u32) -> LoopPhase {
        if self.analysis.is_none() {
            LoopPhase::Idle
        } else if self.is_ready_for_production {
            LoopPhase::ReadyForProduction
        } else if self.iteration_count >= max_iterations {
            LoopPhase::Exhausted
        } else {
            LoopPhase::Analyzed
        }
    }

    /// Shallow-merge a partial snapshot: every present field overwrites.
    pub fn apply_patch(&mut self, patch: AnalysisStatePatch) {
        if let Some(value) = patch.intent {
            self.intent = value;
        }
        if let Some(value) = patch.analysis {
            self.analysis = value;
        }
        if let Some(value) = patch.previous_score {
            self.previous_score = value;
        }
        if let Some(value) = patch.applied_fixes {
            self.applied_fixes = value;
        }
        if let Some(value) = patch.applied_fix_details {
            self.applied_fix_details = value;
        }
        if let Some(value) = patch.iteration_count {
            self.iteration_count = value;
        }
        if let Some(value) = patch.is_ready_for_production {
            self.is_ready_for_production = value;
        }
        if let Some(value) = patch.pending_fixes_count {
            self.pending_fixes_count = value;
        }
        if let Some(value) = patch.server_checkpoint_results {
            self.server_checkpoint_results = value;
        }
        if let Some(value) = patch.checkpoint_overrides {
            self.checkpoint_overrides = value;
        }
        if let Some(value) = patch.is_score_estimated {
            self.is_score_estimated = value;
        }
        if let Some(value) = patch.has_intent_lock {
            self.has_intent_lock = value;
        }
        if let Some(value) = patch.target_profile {
            self.target_profile = value;
        }
        if let Some(value) = patch.weights {
            self.weights = value;
        }
        if let Some(value) = patch.content_fingerprint {
            self.content_fingerprint = value;
        }
    }
}

/// Partial [`AnalysisState`] used by the persistence store's shallow merge.
///
/// Nullable fields use a nested `Option`: `Some(None)` clears the value,
/// `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisStatePatch {
    pub intent: Option<Intent>,
    pub analysis: Option<Option<Analysis>>,
    pub previous_score: Option<Option<u32>>,
    pub applied_fixes: Option<Vec<String>>,
    pub applied_fix_details: Option<Vec<AppliedFix>>,
    pub iteration_count: Option<u32>,
    pub is_ready_for_production: Option<bool>,
    pub pending_fixes_count: Option<u32>,
    pub server_checkpoint_results: Option<CheckpointResults>,
    pub checkpoint_overrides: Option<Vec<CheckpointOverride>>,
    pub is_score_estimated: Option<bool>,
    pub has_intent_lock: Option<bool>,
    pub target_profile: Option<Option<TargetProfile>>,
    pub weights: Option<AxisWeights>,
    pub content_fingerprint: Option<Option<String>>,
}

impl AnalysisStatePatch {
    /// Patch that overwrites every field with the given state.
    pub fn full(state: &AnalysisState) -> Self {
        let state = state.clone();
        Self {
            intent: Some(state.intent),
            analysis: Some(state.analysis),
            previous_score: Some(state.previous_score),
            applied_fixes: Some(state.applied_fixes),
            applied_fix_details: Some(state.applied_fix_details),
            iteration_count: Some(state.iteration_count),
            is_ready_for_production: Some(state.is_ready_for_production),
            pending_fixes_count: Some(state.pending_fixes_count),
            server_checkpoint_results: Some(state.server_checkpoint_results),
            checkpoint_overrides: Some(state.checkpoint_overrides),
            is_score_estimated: Some(state.is_score_estimated),
            has_intent_lock: Some(state.has_intent_lock),
            target_profile: Some(state.target_profile),
            weights: Some(state.weights),
            content_fingerprint: Some(state.content_fingerprint),
        }
    }

    /// Patch touching only the intent.
    pub fn intent(intent: Intent) -> Self {
        Self {
            intent: Some(intent),
            ..Default::default()
        }
    }
}
