//! Refinement loop controller.
//!
//! The top-level state machine of a refinement session:
//!
//! ```text
//! Idle -> Analyzing -> Analyzed --(score >= threshold)--> ReadyForProduction
//!                         |
//!                         +--(iterations == max, not ready)--> Exhausted
//! ```
//!
//! Every public operation loads the session, works on a private copy and
//! persists it only after every external call has succeeded, so a failed
//! operation leaves the stored session exactly as it was. A single in-flight
//! guard rejects concurrent operations instead of interleaving them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::errors::{RefinementError, RefinementResult};
use crate::domain::models::{
    AnalysisState, AnalysisStatePatch, AppliedFix, CheckpointOverride, DetectedIntent, Insight,
    InsightKind, IntentField, LoopPhase, RefinementConfig, ScoreTier, Treatment, TreatmentPatch,
};
use crate::domain::ports::{AnalysisStore, EvaluateRequest, Evaluator, FixApplier, FixRequest};
use crate::services::events::{EventChannel, RefinementEvent};
use crate::services::intent_manager::{self, IntentChange};
use crate::services::reconciliation::{
    content_baseline, content_fingerprint, previous_analysis_context, reduce, ReconcileAction,
};

/// How an analysis should be run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Ask the evaluator for a cheaper, shallower pass.
    pub quick: bool,
    /// The analysis follows at least one applied fix and consumes an iteration.
    pub is_reanalysis: bool,
}

impl AnalysisOptions {
    /// First full analysis of a session.
    pub const fn initial() -> Self {
        Self {
            quick: false,
            is_reanalysis: false,
        }
    }

    pub const fn quick() -> Self {
        Self {
            quick: true,
            is_reanalysis: false,
        }
    }

    /// Full re-analysis after fixes were applied.
    pub const fn reanalysis() -> Self {
        Self {
            quick: false,
            is_reanalysis: true,
        }
    }
}

/// Result of a committed authoritative analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub content_id: String,
    pub score: u32,
    pub tier: ScoreTier,
    pub confidence: f64,
    pub iteration: u32,
    /// Change against the previous authoritative score.
    pub delta: Option<i64>,
    pub phase: LoopPhase,
    pub ready_for_production: bool,
    pub baseline_supplied: bool,
}

/// Result of a single applied fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixOutcome {
    pub insight_id: String,
    pub section: String,
    /// Locally estimated score, when the fix named a checkpoint.
    pub estimated_score: Option<u32>,
    pub score_estimated: bool,
    pub ready_for_production: bool,
    pub pending_fixes: u32,
}

/// A fix that was skipped during a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFix {
    pub insight_id: String,
    pub reason: String,
}

/// Result of applying every outstanding fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFixOutcome {
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedFix>,
    pub estimated_score: Option<u32>,
    pub score_estimated: bool,
    pub ready_for_production: bool,
    pub pending_fixes: u32,
}

/// Releases the in-flight flag when an operation ends, however it ends.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Marks a content identifier as having an evaluator call outstanding.
struct AnalyzingMarker<'a> {
    slot: &'a RwLock<Option<String>>,
}

impl<'a> AnalyzingMarker<'a> {
    fn set(slot: &'a RwLock<Option<String>>, content_id: &str) -> Self {
        if let Ok(mut current) = slot.write() {
            *current = Some(content_id.to_string());
        }
        Self { slot }
    }
}

impl Drop for AnalyzingMarker<'_> {
    fn drop(&mut self) {
        if let Ok(mut current) = self.slot.write() {
            *current = None;
        }
    }
}

/// The refinement loop controller.
///
/// Uses generic type parameters for its collaborators; the evaluator and
/// fix applier are the only suspension points, everything else is
/// synchronous scoring math.
pub struct RefinementLoop<E: Evaluator, F: FixApplier, S: AnalysisStore> {
    evaluator: Arc<E>,
    fix_applier: Arc<F>,
    store: Arc<S>,
    config: RefinementConfig,
    events: EventChannel,
    in_flight: AtomicBool,
    analyzing: RwLock<Option<String>>,
}

impl<E: Evaluator, F: FixApplier, S: AnalysisStore> RefinementLoop<E, F, S> {
    pub fn new(evaluator: Arc<E>, fix_applier: Arc<F>, store: Arc<S>, config: RefinementConfig) -> Self {
        Self {
            evaluator,
            fix_applier,
            store,
            config,
            events: EventChannel::default(),
            in_flight: AtomicBool::new(false),
            analyzing: RwLock::new(None),
        }
    }

    /// Use an existing event channel (e.g. one shared with a UI layer).
    pub fn with_events(mut self, events: EventChannel) -> Self {
        self.events = events;
        self
    }

    pub const fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// Subscribe to refinement events.
    pub fn subscribe(&self) -> broadcast::Receiver<RefinementEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Session state for a content identifier, defaulted if never stored.
    pub async fn state(&self, content_id: &str) -> RefinementResult<AnalysisState> {
        Ok(self
            .store
            .get(content_id)
            .await?
            .unwrap_or_else(|| AnalysisState::new(self.config.weights)))
    }

    /// Current loop phase for a content identifier.
    pub async fn phase(&self, content_id: &str) -> RefinementResult<LoopPhase> {
        let analyzing = self
            .analyzing
            .read()
            .map(|current| current.as_deref() == Some(content_id))
            .unwrap_or(false);
        if analyzing {
            return Ok(LoopPhase::Analyzing);
        }
        Ok(self.state(content_id).await?.phase(self.config.max_iterations))
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Run an authoritative analysis of a treatment.
    ///
    /// The first analysis of a session locks the intent. A re-analysis
    /// consumes one iteration; a failed call consumes nothing.
    pub async fn run_analysis(
        &self,
        treatment: &Treatment,
        options: AnalysisOptions,
    ) -> RefinementResult<AnalysisOutcome> {
        let result = match self.begin() {
            Ok(_guard) => self.analyze(treatment, options).await,
            Err(err) => Err(err),
        };
        self.report(&treatment.id, result)
    }

    /// Replace an estimated score with ground truth by re-analysing.
    pub async fn verify_score(&self, treatment: &Treatment) -> RefinementResult<AnalysisOutcome> {
        let result = match self.begin() {
            Ok(_guard) => self.verify(treatment).await,
            Err(err) => Err(err),
        };
        self.report(&treatment.id, result)
    }

    /// Apply the fix carried by one insight to the treatment.
    ///
    /// On success the treatment is patched in place. If the insight names a
    /// checkpoint, a conservative override is recorded and the score is
    /// re-estimated locally without calling the evaluator.
    pub async fn apply_fix(&self, treatment: &mut Treatment, insight: &Insight) -> RefinementResult<FixOutcome> {
        let content_id = treatment.id.clone();
        let result = match self.begin() {
            Ok(_guard) => self.fix_one(treatment, insight).await,
            Err(err) => Err(err),
        };
        self.report(&content_id, result)
    }

    /// Apply every outstanding, actionable weakness fix in sequence.
    ///
    /// Each fix sees the text produced by the fixes before it. Individual
    /// failures are skipped; one local re-estimate runs at the end.
    pub async fn apply_all_fixes(&self, treatment: &mut Treatment) -> RefinementResult<BatchFixOutcome> {
        let content_id = treatment.id.clone();
        let result = match self.begin() {
            Ok(_guard) => self.fix_all(treatment).await,
            Err(err) => Err(err),
        };
        self.report(&content_id, result)
    }

    /// Clear the whole session, including the score baseline.
    pub async fn reset(&self, content_id: &str) -> RefinementResult<()> {
        let result = match self.begin() {
            Ok(_guard) => self.store.clear(content_id).await.map_err(RefinementError::from),
            Err(err) => Err(err),
        };
        let result = self.report(content_id, result);
        if result.is_ok() {
            info!(content_id, "session reset");
            self.events.publish(RefinementEvent::SessionReset {
                content_id: content_id.to_string(),
                baseline_kept: false,
            });
        }
        result
    }

    /// Edit one intent field, resetting the session if the intent is locked.
    pub async fn change_intent_field(
        &self,
        content_id: &str,
        field: IntentField,
        value: &str,
    ) -> RefinementResult<IntentChange> {
        let result = match self.begin() {
            Ok(_guard) => self.edit_intent(content_id, field, value).await,
            Err(err) => Err(err),
        };
        self.report(content_id, result)
    }

    /// Fill empty intent fields from the treatment while the intent is
    /// unlocked. A no-op once locked.
    pub async fn sync_detected_intent(&self, treatment: &Treatment) -> RefinementResult<DetectedIntent> {
        let result = match self.begin() {
            Ok(_guard) => self.sync_intent(treatment).await,
            Err(err) => Err(err),
        };
        self.report(&treatment.id, result)
    }

    // -----------------------------------------------------------------------
    // Guarded bodies
    // -----------------------------------------------------------------------

    async fn analyze(&self, treatment: &Treatment, options: AnalysisOptions) -> RefinementResult<AnalysisOutcome> {
        validate_content(treatment)?;
        let content_id = treatment.id.as_str();
        let mut working = self.state(content_id).await?;

        if options.is_reanalysis && working.iteration_count >= self.config.max_iterations {
            return Err(RefinementError::IterationLimit {
                max: self.config.max_iterations,
            });
        }

        let next_iteration = if options.is_reanalysis {
            working.iteration_count + 1
        } else {
            working.iteration_count.max(1)
        };

        intent_manager::apply_detected_intent(&mut working, &intent_manager::detect_intent(treatment));
        let lock = intent_manager::lock_intent(&mut working);
        let fingerprint = content_fingerprint(treatment);
        let baseline = content_baseline(&working, &fingerprint);

        let request = EvaluateRequest {
            content_id: content_id.to_string(),
            content: treatment.clone(),
            intent: working.intent.clone(),
            quick_analysis: options.quick,
            iteration: next_iteration,
            previous_analysis: if options.is_reanalysis {
                previous_analysis_context(&working)
            } else {
                None
            },
            target_profile: Some(lock.profile().clone()),
            content_baseline: baseline.clone(),
        };

        debug!(
            content_id,
            iteration = next_iteration,
            quick = options.quick,
            reanalysis = options.is_reanalysis,
            baseline = baseline.is_some(),
            "requesting evaluation"
        );

        let outcome = {
            let _marker = AnalyzingMarker::set(&self.analyzing, content_id);
            self.evaluator
                .evaluate(&request)
                .await
                .map_err(|e| RefinementError::NetworkOrServer(e.to_string()))?
        };

        let score = outcome.analysis.score();
        if let Some(flag) = outcome.ready_for_production {
            if flag != (score >= self.config.ready_threshold) {
                debug!(content_id, score, flag, "evaluator readiness verdict disagrees with threshold");
            }
        }

        let previous_score = working.previous_score;
        reduce(
            &mut working,
            ReconcileAction::Authoritative {
                analysis: outcome.analysis,
                iteration: next_iteration,
                content_fingerprint: fingerprint,
            },
            self.config.ready_threshold,
        );

        self.store
            .set(content_id, AnalysisStatePatch::full(&working))
            .await?;

        let phase = working.phase(self.config.max_iterations);
        let delta = previous_score.map(|before| i64::from(score) - i64::from(before));
        let greenlight = working
            .analysis
            .as_ref()
            .map(|a| a.greenlight_score)
            .ok_or_else(|| RefinementError::Validation("analysis missing after commit".to_string()))?;

        if lock.newly_locked() {
            self.events.publish(RefinementEvent::IntentLocked {
                content_id: content_id.to_string(),
            });
        }
        info!(
            content_id,
            score,
            iteration = next_iteration,
            phase = phase.as_str(),
            "analysis committed"
        );
        self.events.publish(RefinementEvent::AnalysisCommitted {
            content_id: content_id.to_string(),
            score,
            tier: greenlight.tier,
            iteration: next_iteration,
            delta,
            phase,
        });

        Ok(AnalysisOutcome {
            content_id: content_id.to_string(),
            score,
            tier: greenlight.tier,
            confidence: greenlight.confidence,
            iteration: next_iteration,
            delta,
            phase,
            ready_for_production: working.is_ready_for_production,
            baseline_supplied: baseline.is_some(),
        })
    }

    async fn verify(&self, treatment: &Treatment) -> RefinementResult<AnalysisOutcome> {
        validate_content(treatment)?;
        let state = self.state(&treatment.id).await?;
        if !state.is_score_estimated {
            return Err(RefinementError::Validation(
                "The current score is already verified; there is nothing to confirm.".to_string(),
            ));
        }
        self.analyze(treatment, AnalysisOptions::reanalysis()).await
    }

    async fn fix_one(&self, treatment: &mut Treatment, insight: &Insight) -> RefinementResult<FixOutcome> {
        validate_content(treatment)?;
        let mut working = self.state(&treatment.id).await?;
        self.ensure_fixable(&working)?;

        if working.is_fix_applied(&insight.id) {
            return Err(RefinementError::FixUnavailable {
                insight_id: insight.id.clone(),
                reason: "the fix for this insight was already applied".to_string(),
            });
        }
        let (section, instruction) = fix_instruction(insight)?;

        let patch = self.request_fix(treatment, section, instruction).await?;
        let mut patched = treatment.clone();
        patched.merge(patch);

        let override_candidate = record_fix(&mut working, insight, section, instruction, &self.config);
        let estimated = match override_candidate {
            Some(candidate) => {
                let effect = reduce(
                    &mut working,
                    ReconcileAction::Optimistic {
                        overrides: vec![candidate],
                    },
                    self.config.ready_threshold,
                );
                effect.estimate_recomputed
            }
            None => false,
        };

        self.store
            .set(&treatment.id, AnalysisStatePatch::full(&working))
            .await?;
        *treatment = patched;

        info!(content_id = %treatment.id, insight_id = %insight.id, section, "fix applied");
        self.events.publish(RefinementEvent::FixApplied {
            content_id: treatment.id.clone(),
            insight_id: insight.id.clone(),
            section: section.to_string(),
        });
        if estimated {
            self.publish_estimate(&treatment.id, &working);
        }

        Ok(FixOutcome {
            insight_id: insight.id.clone(),
            section: section.to_string(),
            estimated_score: if estimated { working.score() } else { None },
            score_estimated: working.is_score_estimated,
            ready_for_production: working.is_ready_for_production,
            pending_fixes: working.pending_fixes_count,
        })
    }

    async fn fix_all(&self, treatment: &mut Treatment) -> RefinementResult<BatchFixOutcome> {
        validate_content(treatment)?;
        let content_id = treatment.id.clone();
        let mut working = self.state(&content_id).await?;
        self.ensure_fixable(&working)?;

        let outstanding: Vec<Insight> = working
            .analysis
            .as_ref()
            .map(|a| {
                a.insights
                    .iter()
                    .filter(|i| i.kind == InsightKind::Weakness && !working.is_fix_applied(&i.id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let mut snapshot = treatment.clone();
        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        let mut overrides: Vec<CheckpointOverride> = Vec::new();
        let mut attempted = 0usize;
        let mut fixed_events = Vec::new();

        for insight in &outstanding {
            let (section, instruction) = match fix_instruction(insight) {
                Ok(parts) => parts,
                Err(err) => {
                    skipped.push(self.skip(&content_id, insight, &err));
                    continue;
                }
            };

            attempted += 1;
            match self.request_fix(&snapshot, section, instruction).await {
                Ok(patch) => {
                    snapshot.merge(patch);
                    if let Some(candidate) = record_fix(&mut working, insight, section, instruction, &self.config) {
                        overrides.push(candidate);
                    }
                    applied.push(insight.id.clone());
                    fixed_events.push(RefinementEvent::FixApplied {
                        content_id: content_id.clone(),
                        insight_id: insight.id.clone(),
                        section: section.to_string(),
                    });
                }
                Err(err) => skipped.push(self.skip(&content_id, insight, &err)),
            }
        }

        if attempted > 0 && applied.is_empty() {
            return Err(RefinementError::NetworkOrServer(format!(
                "none of the {attempted} fixes could be applied"
            )));
        }

        let estimated = if overrides.is_empty() {
            false
        } else {
            let effect = reduce(
                &mut working,
                ReconcileAction::Optimistic { overrides },
                self.config.ready_threshold,
            );
            effect.estimate_recomputed
        };

        if !applied.is_empty() {
            self.store
                .set(&content_id, AnalysisStatePatch::full(&working))
                .await?;
            *treatment = snapshot;
        }

        info!(
            content_id = %content_id,
            applied = applied.len(),
            skipped = skipped.len(),
            "batch fixes applied"
        );
        // Only announce fixes once the session write has landed.
        for event in fixed_events {
            self.events.publish(event);
        }
        if estimated {
            self.publish_estimate(&content_id, &working);
        }

        Ok(BatchFixOutcome {
            applied,
            skipped,
            estimated_score: if estimated { working.score() } else { None },
            score_estimated: working.is_score_estimated,
            ready_for_production: working.is_ready_for_production,
            pending_fixes: working.pending_fixes_count,
        })
    }

    async fn edit_intent(&self, content_id: &str, field: IntentField, value: &str) -> RefinementResult<IntentChange> {
        let stored = self.store.get(content_id).await?;
        let existed = stored.is_some();
        let mut working = stored.unwrap_or_else(|| AnalysisState::new(self.config.weights));
        let change = intent_manager::change_intent_field(&mut working, field, value);

        match change {
            IntentChange::Unchanged => {}
            IntentChange::Updated => {
                self.store
                    .set(content_id, intent_patch(&working, existed))
                    .await?;
            }
            IntentChange::SessionReset => {
                self.store
                    .set(content_id, AnalysisStatePatch::full(&working))
                    .await?;
                self.events.publish(RefinementEvent::SessionReset {
                    content_id: content_id.to_string(),
                    baseline_kept: working.previous_score.is_some(),
                });
            }
        }
        Ok(change)
    }

    async fn sync_intent(&self, treatment: &Treatment) -> RefinementResult<DetectedIntent> {
        let stored = self.store.get(&treatment.id).await?;
        let existed = stored.is_some();
        let mut working = stored.unwrap_or_else(|| AnalysisState::new(self.config.weights));
        let detected = intent_manager::detect_intent(treatment);
        if intent_manager::apply_detected_intent(&mut working, &detected) {
            self.store
                .set(&treatment.id, intent_patch(&working, existed))
                .await?;
        }
        Ok(detected)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Acquire the in-flight guard or reject the call.
    fn begin(&self) -> RefinementResult<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| InFlight {
                flag: &self.in_flight,
            })
            .map_err(|_| RefinementError::OperationInProgress)
    }

    /// Fixes need an analysis and remaining iteration budget.
    fn ensure_fixable(&self, state: &AnalysisState) -> RefinementResult<()> {
        if state.iteration_count >= self.config.max_iterations {
            return Err(RefinementError::IterationLimit {
                max: self.config.max_iterations,
            });
        }
        if state.analysis.is_none() {
            return Err(RefinementError::Validation(
                "Run an analysis before applying fixes.".to_string(),
            ));
        }
        Ok(())
    }

    async fn request_fix(&self, treatment: &Treatment, section: &str, instruction: &str) -> RefinementResult<TreatmentPatch> {
        let request = FixRequest {
            content: treatment.clone(),
            section: section.to_string(),
            instruction: instruction.to_string(),
        };
        let patch = self
            .fix_applier
            .apply_fix(&request)
            .await
            .map_err(|e| RefinementError::NetworkOrServer(e.to_string()))?;
        if patch.is_empty() {
            return Err(RefinementError::NetworkOrServer(
                "fix service returned no changes".to_string(),
            ));
        }
        Ok(patch)
    }

    fn skip(&self, content_id: &str, insight: &Insight, err: &RefinementError) -> SkippedFix {
        warn!(content_id, insight_id = %insight.id, error = %err, "skipping fix");
        let reason = match err {
            RefinementError::FixUnavailable { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        self.events.publish(RefinementEvent::FixSkipped {
            content_id: content_id.to_string(),
            insight_id: insight.id.clone(),
            reason: reason.clone(),
        });
        SkippedFix {
            insight_id: insight.id.clone(),
            reason,
        }
    }

    fn publish_estimate(&self, content_id: &str, state: &AnalysisState) {
        if let Some(score) = state.score() {
            info!(content_id, score, ready = state.is_ready_for_production, "score estimated locally");
            self.events.publish(RefinementEvent::ScoreEstimated {
                content_id: content_id.to_string(),
                score,
                ready_for_production: state.is_ready_for_production,
            });
        }
    }

    /// Log and publish a rejected operation, passing the result through.
    fn report<T>(&self, content_id: &str, result: RefinementResult<T>) -> RefinementResult<T> {
        if let Err(err) = &result {
            warn!(content_id, kind = err.kind(), error = %err, "operation rejected");
            self.events.publish(RefinementEvent::OperationRejected {
                content_id: content_id.to_string(),
                kind: err.kind().to_string(),
                message: err.user_message(),
            });
        }
        result
    }
}

fn validate_content(treatment: &Treatment) -> RefinementResult<()> {
    if treatment.id.trim().is_empty() || treatment.is_blank() {
        return Err(RefinementError::Validation(
            "No treatment selected. Choose a treatment with a title or synopsis first.".to_string(),
        ));
    }
    Ok(())
}

/// Patch persisting an intent edit. A session that was never stored is
/// written in full so it keeps the configured weights.
fn intent_patch(state: &AnalysisState, existed: bool) -> AnalysisStatePatch {
    if existed {
        AnalysisStatePatch::intent(state.intent.clone())
    } else {
        AnalysisStatePatch::full(state)
    }
}

fn fix_instruction(insight: &Insight) -> RefinementResult<(&str, &str)> {
    insight
        .fix_instruction()
        .ok_or_else(|| RefinementError::FixUnavailable {
            insight_id: insight.id.clone(),
            reason: "the insight has no fix suggestion or target section".to_string(),
        })
}

/// Record an applied fix on the session and return the optimistic override
/// it implies, if the insight names a checkpoint.
fn record_fix(
    state: &mut AnalysisState,
    insight: &Insight,
    section: &str,
    instruction: &str,
    config: &RefinementConfig,
) -> Option<CheckpointOverride> {
    state.applied_fixes.push(insight.id.clone());
    state
        .applied_fix_details
        .push(AppliedFix::from_insight(insight, section, instruction));
    state.pending_fixes_count += 1;

    insight.checkpoint_target().map(|(checkpoint_id, axis)| {
        CheckpointOverride::likely_fixed(checkpoint_id, axis, config.optimistic_override_score)
    })
}
