//! Common test utilities for integration tests
//!
//! Scripted collaborators and fixtures shared by the refinement loop tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use resonance::adapters::memory::InMemoryAnalysisStore;
use resonance::domain::errors::{DomainError, DomainResult};
use resonance::domain::models::{
    Analysis, AnalysisState, AnalysisStatePatch, Axis, AxisWeights, Checkpoint, CheckpointResults, GreenlightScore, Insight,
    InsightKind, RefinementConfig, Treatment, TreatmentPatch,
};
use resonance::domain::ports::{
    AnalysisStore, CollaboratorError, EvaluateRequest, EvaluationOutcome, Evaluator, FixApplier, FixRequest,
};
use resonance::services::{aggregate, RefinementLoop};

pub type TestLoop = RefinementLoop<MockEvaluator, MockFixApplier, InMemoryAnalysisStore>;

/// Evaluator that replays scripted responses and records every request.
///
/// Once the script runs out it answers with [`baseline_analysis`].
#[derive(Default)]
pub struct MockEvaluator {
    responses: Mutex<VecDeque<Result<EvaluationOutcome, CollaboratorError>>>,
    requests: Mutex<Vec<EvaluateRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_analysis(&self, analysis: Analysis) {
        self.push(Ok(EvaluationOutcome {
            analysis,
            ready_for_production: None,
        }));
    }

    pub fn push_failure(&self, reason: &str) {
        self.push(Err(CollaboratorError::Unreachable(reason.to_string())));
    }

    pub fn push(&self, response: Result<EvaluationOutcome, CollaboratorError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<EvaluateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<EvaluateRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationOutcome, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.responses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(EvaluationOutcome {
                analysis: baseline_analysis(),
                ready_for_production: None,
            })
        })
    }
}

/// Fix applier that rewrites the requested section as
/// `"rewritten: <instruction>"`, unless told to fail.
#[derive(Default)]
pub struct MockFixApplier {
    failing_sections: Mutex<Vec<String>>,
    requests: Mutex<Vec<FixRequest>>,
    calls: AtomicUsize,
}

impl MockFixApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_section(&self, section: &str) {
        self.failing_sections.lock().unwrap().push(section.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FixRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FixApplier for MockFixApplier {
    async fn apply_fix(&self, request: &FixRequest) -> Result<TreatmentPatch, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let failing = self
            .failing_sections
            .lock()
            .unwrap()
            .iter()
            .any(|s| s == &request.section);
        if failing {
            return Err(CollaboratorError::Rejected(format!("cannot rewrite {}", request.section)));
        }
        Ok(TreatmentPatch::section(
            &request.section,
            format!("rewritten: {}", request.instruction),
        ))
    }
}

/// In-memory store whose writes can be switched to fail.
#[derive(Default)]
pub struct FailingWritesStore {
    inner: InMemoryAnalysisStore,
    fail_writes: AtomicBool,
}

impl FailingWritesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalysisStore for FailingWritesStore {
    async fn get(&self, content_id: &str) -> DomainResult<Option<AnalysisState>> {
        self.inner.get(content_id).await
    }

    async fn set(&self, content_id: &str, patch: AnalysisStatePatch) -> DomainResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError("disk full".to_string()));
        }
        self.inner.set(content_id, patch).await
    }

    async fn clear(&self, content_id: &str) -> DomainResult<()> {
        self.inner.clear(content_id).await
    }
}

/// A fresh loop over an in-memory store.
pub fn test_loop(config: RefinementConfig) -> (TestLoop, Arc<MockEvaluator>, Arc<MockFixApplier>, Arc<InMemoryAnalysisStore>) {
    test_loop_with(MockEvaluator::new(), config)
}

pub fn test_loop_with(
    evaluator: MockEvaluator,
    config: RefinementConfig,
) -> (TestLoop, Arc<MockEvaluator>, Arc<MockFixApplier>, Arc<InMemoryAnalysisStore>) {
    let evaluator = Arc::new(evaluator);
    let fix_applier = Arc::new(MockFixApplier::new());
    let store = Arc::new(InMemoryAnalysisStore::new());
    let engine = RefinementLoop::new(evaluator.clone(), fix_applier.clone(), store.clone(), config);
    (engine, evaluator, fix_applier, store)
}

pub fn treatment() -> Treatment {
    let mut treatment = Treatment::new(
        "night-shift",
        "Night Shift",
        "A hospital janitor uncovers a smuggling ring run by the night staff.",
    )
    .with_genre("Thriller")
    .with_tone("Dark and tense")
    .with_section("characters", "Marta, a janitor with a past.");
    treatment.logline = Some("One janitor. One night. No way out.".to_string());
    treatment
}

/// Checkpoint results: each axis gets one checkpoint at 7, except pacing
/// whose `p1` checkpoint scores the given value.
pub fn checkpoint_results(pacing_score: f64) -> CheckpointResults {
    let mut results = CheckpointResults::new();
    for axis in Axis::ALL {
        let (id, score) = if axis == Axis::Pacing { ("p1", pacing_score) } else { ("c1", 7.0) };
        let mut checkpoints = BTreeMap::new();
        checkpoints.insert(id.to_string(), Checkpoint::new(id, axis, score >= 7.0).with_score(score));
        results.insert(axis, checkpoints);
    }
    results
}

pub fn weakness(id: &str, checkpoint: Option<(&str, Axis)>, section: &str, suggestion: &str) -> Insight {
    Insight {
        id: id.to_string(),
        kind: InsightKind::Weakness,
        title: format!("Weakness {id}"),
        text: "Needs work.".to_string(),
        axis_id: checkpoint.map(|(_, axis)| axis),
        checkpoint_id: checkpoint.map(|(cp, _)| cp.to_string()),
        fix_suggestion: Some(suggestion.to_string()),
        fix_section: Some(section.to_string()),
    }
}

/// Standard insights: a checkpoint-targeted weakness, a second weakness on
/// the same checkpoint, a general weakness, one without a fix and a strength.
pub fn insights() -> Vec<Insight> {
    let mut no_fix = weakness("i-nofix", None, "synopsis", "");
    no_fix.fix_suggestion = None;
    let mut strength = weakness("i-strength", None, "title", "Keep it.");
    strength.kind = InsightKind::Strength;

    vec![
        weakness("i-pacing", Some(("p1", Axis::Pacing)), "synopsis", "Add a midpoint reversal."),
        weakness("i-pacing-2", Some(("p1", Axis::Pacing)), "synopsis", "Shorten the first act."),
        weakness("i-general", None, "logline", "Sharpen the hook."),
        no_fix,
        strength,
    ]
}

/// Analysis aggregated from [`checkpoint_results`] with default weights.
///
/// With pacing at 4 the overall score is 64; an override of 8 on `p1`
/// lifts it to 72.
pub fn analysis_with_pacing(pacing_score: f64) -> Analysis {
    let results = checkpoint_results(pacing_score);
    let aggregated = aggregate(&results, &[], &AxisWeights::default(), 0.8);
    Analysis {
        greenlight_score: aggregated.greenlight_score,
        axes: aggregated.axes,
        insights: insights(),
        recommendations: vec!["Tighten the second act.".to_string()],
        checkpoint_results: results,
        credits_used: 2,
    }
}

/// The default scripted analysis: overall 64.
pub fn baseline_analysis() -> Analysis {
    analysis_with_pacing(4.0)
}

/// Analysis with a fixed overall score and the standard checkpoint results.
pub fn analysis_scoring(score: u32) -> Analysis {
    let mut analysis = baseline_analysis();
    analysis.greenlight_score = GreenlightScore::new(score, 0.9);
    analysis
}
