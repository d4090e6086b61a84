//! Reconciliation of authoritative and optimistic scoring.
//!
//! Session scores come from two sources: the evaluator (ground truth) and
//! locally asserted overrides created the moment a fix is applied. They are
//! merged through a small reducer in which an authoritative result always
//! fully supersedes pending optimistic state; the two are never partially
//! merged.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::models::{
    Analysis, AnalysisState, CheckpointOverride, CheckpointResults, Treatment,
};
use crate::domain::ports::{ContentBaseline, PreviousAnalysisContext};
use crate::services::aggregator::{aggregate, flatten_effective_scores};

/// Note attached to a content baseline.
pub const CONTENT_BASELINE_NOTE: &str =
    "Content quality is unchanged; only the targeting intent was modified. \
     Score relative to this baseline.";

/// An input to the reconciliation reducer.
#[derive(Debug, Clone)]
pub enum ReconcileAction {
    /// A successful authoritative evaluation.
    Authoritative {
        analysis: Analysis,
        iteration: u32,
        content_fingerprint: String,
    },
    /// Optimistic overrides asserted after fixes were applied.
    Optimistic { overrides: Vec<CheckpointOverride> },
}

/// What a reduction changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileEffect {
    pub score_before: Option<u32>,
    pub score_after: Option<u32>,
    /// Overrides newly inserted (optimistic actions only).
    pub overrides_added: usize,
    /// The displayed score was re-estimated locally.
    pub estimate_recomputed: bool,
    pub became_ready: bool,
}

/// Insert an override keyed by `(checkpoint_id, axis_id)`.
///
/// Returns `false` when an override for that key already exists; the
/// existing entry is kept untouched.
pub fn insert_override(overrides: &mut Vec<CheckpointOverride>, candidate: CheckpointOverride) -> bool {
    if overrides
        .iter()
        .any(|o| o.matches(&candidate.checkpoint_id, candidate.axis_id))
    {
        return false;
    }
    overrides.push(candidate);
    true
}

/// Apply a reconciliation action to a session.
pub fn reduce(state: &mut AnalysisState, action: ReconcileAction, ready_threshold: u32) -> ReconcileEffect {
    let score_before = state.score();
    let was_ready = state.is_ready_for_production;

    let mut estimate_recomputed = false;
    let overrides_added = match action {
        ReconcileAction::Authoritative {
            analysis,
            iteration,
            content_fingerprint,
        } => {
            state.previous_score = Some(analysis.score());
            state.server_checkpoint_results = analysis.checkpoint_results.clone();
            state.analysis = Some(analysis);
            state.checkpoint_overrides.clear();
            state.is_score_estimated = false;
            state.pending_fixes_count = 0;
            state.iteration_count = iteration;
            state.content_fingerprint = Some(content_fingerprint);
            0
        }
        ReconcileAction::Optimistic { overrides } => {
            let added: Vec<CheckpointOverride> = overrides
                .into_iter()
                .filter(|o| insert_override(&mut state.checkpoint_overrides, o.clone()))
                .collect();
            // Overrides for checkpoints the evaluator never reported cannot
            // move the estimate; the authoritative score stands.
            if added
                .iter()
                .any(|o| is_known_checkpoint(&state.server_checkpoint_results, o))
            {
                recompute_estimate(state);
                estimate_recomputed = true;
            } else if !added.is_empty() {
                debug!(overrides = added.len(), "overrides target unknown checkpoints, keeping score");
            }
            added.len()
        }
    };

    state.is_ready_for_production = state
        .score()
        .is_some_and(|score| score >= ready_threshold);

    ReconcileEffect {
        score_before,
        score_after: state.score(),
        overrides_added,
        estimate_recomputed,
        became_ready: !was_ready && state.is_ready_for_production,
    }
}

fn is_known_checkpoint(results: &CheckpointResults, candidate: &CheckpointOverride) -> bool {
    results
        .get(&candidate.axis_id)
        .is_some_and(|checkpoints| checkpoints.contains_key(&candidate.checkpoint_id))
}

/// Recompute the displayed score locally from the authoritative checkpoint
/// results overlaid with pending overrides.
fn recompute_estimate(state: &mut AnalysisState) {
    let weights = state.weights;
    let Some(analysis) = state.analysis.as_mut() else {
        return;
    };

    let result = aggregate(
        &state.server_checkpoint_results,
        &state.checkpoint_overrides,
        &weights,
        analysis.greenlight_score.confidence,
    );
    debug!(
        before = analysis.greenlight_score.score,
        after = result.greenlight_score.score,
        overrides = state.checkpoint_overrides.len(),
        "recomputed estimated score"
    );
    analysis.greenlight_score = result.greenlight_score;
    analysis.axes = result.axes;
    state.is_score_estimated = true;
}

/// Context sent with a re-analysis, or `None` before the first analysis.
pub fn previous_analysis_context(state: &AnalysisState) -> Option<PreviousAnalysisContext> {
    let analysis = state.analysis.as_ref()?;
    let flattened = flatten_effective_scores(&state.server_checkpoint_results, &state.checkpoint_overrides);

    Some(PreviousAnalysisContext {
        score: analysis.score(),
        axis_scores: analysis.axes.iter().map(|a| (a.axis, a.score)).collect(),
        passed_checkpoints: flattened
            .iter()
            .filter(|(_, _, passed)| *passed)
            .map(|(key, _, _)| key.clone())
            .collect(),
        checkpoint_scores: flattened.into_iter().map(|(key, score, _)| (key, score)).collect(),
        applied_fixes: state.applied_fix_details.clone(),
    })
}

/// Score anchor for the next analysis.
///
/// Supplied only when the session was reset by an intent change (no
/// analysis, baseline score kept) and the content about to be analysed is
/// the same content that produced the baseline.
pub fn content_baseline(state: &AnalysisState, fingerprint: &str) -> Option<ContentBaseline> {
    if state.analysis.is_some() {
        return None;
    }
    let score = state.previous_score?;
    if state.content_fingerprint.as_deref() != Some(fingerprint) {
        return None;
    }
    Some(ContentBaseline {
        score,
        note: CONTENT_BASELINE_NOTE.to_string(),
    })
}

/// Stable digest of a treatment's content.
pub fn content_fingerprint(treatment: &Treatment) -> String {
    let canonical = serde_json::to_vec(treatment).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}
