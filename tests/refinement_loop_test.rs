//! Integration tests for the refinement loop controller.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use resonance::domain::models::{CheckpointResults, IntentField, LoopPhase, RefinementConfig, ScoreTier, Treatment};
use resonance::domain::ports::AnalysisStore;
use resonance::services::{AnalysisOptions, IntentChange, RefinementEvent, RefinementLoop};
use resonance::RefinementError;

const ID: &str = "night-shift";

fn pacing_insight() -> resonance::domain::models::Insight {
    insights().into_iter().find(|i| i.id == "i-pacing").unwrap()
}

#[tokio::test]
async fn test_first_analysis_locks_intent_and_commits() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    let outcome = engine
        .run_analysis(&treatment(), AnalysisOptions::initial())
        .await
        .unwrap();

    assert_eq!(outcome.score, 64);
    assert_eq!(outcome.tier, ScoreTier::for_score(64));
    assert_eq!(outcome.iteration, 1);
    assert_eq!(outcome.delta, None);
    assert_eq!(outcome.phase, LoopPhase::Analyzed);
    assert!(!outcome.ready_for_production);
    assert!(!outcome.baseline_supplied);

    let state = engine.state(ID).await.unwrap();
    assert!(state.has_intent_lock);
    assert_eq!(state.intent.primary_genre, "thriller");
    assert_eq!(state.previous_score, Some(64));
    assert_eq!(state.iteration_count, 1);

    let request = evaluator.last_request().unwrap();
    assert_eq!(request.iteration, 1);
    assert!(request.previous_analysis.is_none());
    assert!(request.content_baseline.is_none());
    assert_eq!(request.target_profile.unwrap().primary_genre, "thriller");
}

#[tokio::test]
async fn test_blank_treatment_is_rejected_without_calling_evaluator() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    let mut events = engine.subscribe();

    let err = engine
        .run_analysis(&Treatment::new(ID, " ", ""), AnalysisOptions::initial())
        .await
        .unwrap_err();

    assert!(matches!(err, RefinementError::Validation(_)));
    assert_eq!(evaluator.calls(), 0);
    assert!(matches!(
        events.try_recv().unwrap(),
        RefinementEvent::OperationRejected { ref kind, .. } if kind == err.kind()
    ));
}

#[tokio::test]
async fn test_events_published_for_committed_analysis() {
    let (engine, _, _, _) = test_loop(RefinementConfig::default());
    let mut events = engine.subscribe();

    engine
        .run_analysis(&treatment(), AnalysisOptions::initial())
        .await
        .unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        RefinementEvent::IntentLocked {
            content_id: ID.to_string()
        }
    );
    assert!(matches!(
        events.try_recv().unwrap(),
        RefinementEvent::AnalysisCommitted { score: 64, iteration: 1, .. }
    ));
}

#[tokio::test]
async fn test_readiness_threshold_boundary() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    evaluator.push_analysis(analysis_scoring(79));
    let below = engine
        .run_analysis(&treatment(), AnalysisOptions::initial())
        .await
        .unwrap();
    assert!(!below.ready_for_production);
    assert_eq!(below.phase, LoopPhase::Analyzed);

    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    evaluator.push_analysis(analysis_scoring(80));
    let at = engine
        .run_analysis(&treatment(), AnalysisOptions::initial())
        .await
        .unwrap();
    assert!(at.ready_for_production);
    assert_eq!(at.phase, LoopPhase::ReadyForProduction);
    assert_eq!(engine.phase(ID).await.unwrap(), LoopPhase::ReadyForProduction);
}

#[tokio::test]
async fn test_evaluator_readiness_flag_does_not_override_score() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    evaluator.push(Ok(resonance::domain::ports::EvaluationOutcome {
        analysis: analysis_scoring(70),
        ready_for_production: Some(true),
    }));

    let outcome = engine
        .run_analysis(&treatment(), AnalysisOptions::initial())
        .await
        .unwrap();
    assert!(!outcome.ready_for_production);
}

#[tokio::test]
async fn test_fix_estimates_score_without_calling_evaluator() {
    let (engine, evaluator, fix_applier, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();

    let outcome = engine.apply_fix(&mut content, &pacing_insight()).await.unwrap();

    assert_eq!(evaluator.calls(), 1);
    assert_eq!(fix_applier.calls(), 1);
    assert_eq!(outcome.section, "synopsis");
    assert_eq!(outcome.estimated_score, Some(72));
    assert!(outcome.score_estimated);
    assert_eq!(outcome.pending_fixes, 1);
    assert_eq!(content.synopsis, "rewritten: Add a midpoint reversal.");

    let state = engine.state(ID).await.unwrap();
    assert_eq!(state.score(), Some(72));
    assert_eq!(state.iteration_count, 1);
    assert_eq!(state.applied_fixes, vec!["i-pacing".to_string()]);
    assert_eq!(state.applied_fix_details.len(), 1);
    assert_eq!(state.checkpoint_overrides.len(), 1);
    // The authoritative checkpoint result is untouched.
    let p1 = &state.server_checkpoint_results[&resonance::domain::models::Axis::Pacing]["p1"];
    assert_eq!(p1.score, Some(4.0));
}

#[tokio::test]
async fn test_fix_for_unreported_checkpoint_keeps_authoritative_score() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    let mut bare = analysis_scoring(75);
    bare.checkpoint_results = CheckpointResults::new();
    evaluator.push_analysis(bare);
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();

    let outcome = engine.apply_fix(&mut content, &pacing_insight()).await.unwrap();

    assert_eq!(outcome.estimated_score, None);
    assert!(!outcome.score_estimated);
    assert_eq!(outcome.pending_fixes, 1);

    let state = engine.state(ID).await.unwrap();
    assert_eq!(state.score(), Some(75));
    assert!(!state.is_score_estimated);
    assert_eq!(state.pending_fixes_count, 1);
    assert_eq!(state.checkpoint_overrides.len(), 1);
}

#[tokio::test]
async fn test_overrides_on_same_checkpoint_are_idempotent() {
    let (engine, _, _, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();

    let all = insights();
    engine.apply_fix(&mut content, &all[0]).await.unwrap();
    let second = engine.apply_fix(&mut content, &all[1]).await.unwrap();

    assert_eq!(second.estimated_score, None);
    let state = engine.state(ID).await.unwrap();
    assert_eq!(state.checkpoint_overrides.len(), 1);
    assert_eq!(state.score(), Some(72));
    assert_eq!(state.pending_fixes_count, 2);
}

#[tokio::test]
async fn test_same_fix_cannot_be_applied_twice() {
    let (engine, _, fix_applier, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();

    engine.apply_fix(&mut content, &pacing_insight()).await.unwrap();
    let err = engine.apply_fix(&mut content, &pacing_insight()).await.unwrap_err();

    assert!(matches!(err, RefinementError::FixUnavailable { ref insight_id, .. } if insight_id == "i-pacing"));
    assert_eq!(fix_applier.calls(), 1);
}

#[tokio::test]
async fn test_fix_requires_analysis() {
    let (engine, _, fix_applier, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();

    let err = engine.apply_fix(&mut content, &pacing_insight()).await.unwrap_err();
    assert!(matches!(err, RefinementError::Validation(_)));
    assert_eq!(fix_applier.calls(), 0);
}

#[tokio::test]
async fn test_failed_fix_leaves_treatment_and_session_untouched() {
    let (engine, _, fix_applier, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    let before = engine.state(ID).await.unwrap();
    fix_applier.fail_section("synopsis");

    let err = engine.apply_fix(&mut content, &pacing_insight()).await.unwrap_err();

    assert!(matches!(err, RefinementError::NetworkOrServer(_)));
    assert_eq!(content, treatment());
    assert_eq!(engine.state(ID).await.unwrap(), before);
}

#[tokio::test]
async fn test_apply_all_fixes_accumulates_and_skips() {
    let (engine, evaluator, fix_applier, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();

    let outcome = engine.apply_all_fixes(&mut content).await.unwrap();

    assert_eq!(outcome.applied, vec!["i-pacing", "i-pacing-2", "i-general"]);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].insight_id, "i-nofix");
    assert_eq!(outcome.estimated_score, Some(72));
    assert_eq!(outcome.pending_fixes, 3);
    assert_eq!(evaluator.calls(), 1);

    // Each fix sees the text produced by the one before it.
    let requests = fix_applier.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].content.synopsis, "rewritten: Add a midpoint reversal.");
    assert_eq!(content.synopsis, "rewritten: Shorten the first act.");
    assert_eq!(content.logline.as_deref(), Some("rewritten: Sharpen the hook."));

    let state = engine.state(ID).await.unwrap();
    assert_eq!(state.checkpoint_overrides.len(), 1);
    assert_eq!(state.applied_fixes.len(), 3);
}

#[tokio::test]
async fn test_apply_all_fixes_announces_nothing_when_session_write_fails() {
    let evaluator = Arc::new(MockEvaluator::new());
    let fix_applier = Arc::new(MockFixApplier::new());
    let store = Arc::new(FailingWritesStore::new());
    let engine = RefinementLoop::new(evaluator, fix_applier, store.clone(), RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    let before = engine.state(ID).await.unwrap();
    let mut events = engine.subscribe();
    store.fail_writes();

    let err = engine.apply_all_fixes(&mut content).await.unwrap_err();

    assert!(matches!(err, RefinementError::Store(_)));
    assert_eq!(content, treatment());
    assert_eq!(engine.state(ID).await.unwrap(), before);
    let mut published = Vec::new();
    while let Ok(event) = events.try_recv() {
        published.push(event);
    }
    assert!(!published
        .iter()
        .any(|e| matches!(e, RefinementEvent::FixApplied { .. })));
}

#[tokio::test]
async fn test_apply_all_fixes_announces_each_fix_after_saving() {
    let (engine, _, _, store) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    let mut events = engine.subscribe();

    engine.apply_all_fixes(&mut content).await.unwrap();

    let mut fixed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RefinementEvent::FixApplied { insight_id, .. } = event {
            fixed.push(insight_id);
        }
    }
    assert_eq!(fixed, vec!["i-pacing", "i-pacing-2", "i-general"]);
    assert_eq!(store.get(ID).await.unwrap().unwrap().applied_fixes.len(), 3);
}

#[tokio::test]
async fn test_apply_all_fixes_skips_individual_failures() {
    let (engine, _, fix_applier, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    fix_applier.fail_section("logline");

    let outcome = engine.apply_all_fixes(&mut content).await.unwrap();

    assert_eq!(outcome.applied, vec!["i-pacing", "i-pacing-2"]);
    let skipped: Vec<_> = outcome.skipped.iter().map(|s| s.insight_id.as_str()).collect();
    assert_eq!(skipped, vec!["i-general", "i-nofix"]);
    assert_eq!(content.logline, treatment().logline);
}

#[tokio::test]
async fn test_apply_all_fixes_fails_when_nothing_applies() {
    let (engine, _, fix_applier, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    let before = engine.state(ID).await.unwrap();
    fix_applier.fail_section("synopsis");
    fix_applier.fail_section("logline");

    let err = engine.apply_all_fixes(&mut content).await.unwrap_err();

    assert!(matches!(err, RefinementError::NetworkOrServer(_)));
    assert_eq!(content, treatment());
    assert_eq!(engine.state(ID).await.unwrap(), before);
}

#[tokio::test]
async fn test_verify_requires_estimated_score() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    let content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();

    let err = engine.verify_score(&content).await.unwrap_err();
    assert!(matches!(err, RefinementError::Validation(_)));
    assert_eq!(evaluator.calls(), 1);
}

#[tokio::test]
async fn test_verify_replaces_estimate_with_ground_truth() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    engine.apply_fix(&mut content, &pacing_insight()).await.unwrap();
    // pacing 100, every other axis 70: 0.2 * (280 + 100) = 76
    evaluator.push_analysis(analysis_with_pacing(10.0));

    let outcome = engine.verify_score(&content).await.unwrap();

    assert_eq!(outcome.score, 76);
    assert_eq!(outcome.iteration, 2);
    assert_eq!(outcome.delta, Some(12));

    let request = evaluator.last_request().unwrap();
    assert_eq!(request.iteration, 2);
    let previous = request.previous_analysis.unwrap();
    assert_eq!(previous.score, 72);
    assert!((previous.checkpoint_scores["pacing.p1"] - 8.0).abs() < f64::EPSILON);
    assert!(previous.passed_checkpoints.contains(&"pacing.p1".to_string()));
    assert_eq!(previous.applied_fixes.len(), 1);

    let state = engine.state(ID).await.unwrap();
    assert!(!state.is_score_estimated);
    assert!(state.checkpoint_overrides.is_empty());
    assert_eq!(state.pending_fixes_count, 0);
    assert_eq!(state.applied_fixes.len(), 1);
}

#[tokio::test]
async fn test_failed_analysis_consumes_no_iteration() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    engine.apply_fix(&mut content, &pacing_insight()).await.unwrap();
    let before = engine.state(ID).await.unwrap();
    evaluator.push_failure("connection refused");

    let err = engine
        .run_analysis(&content, AnalysisOptions::reanalysis())
        .await
        .unwrap_err();

    assert!(matches!(err, RefinementError::NetworkOrServer(_)));
    let after = engine.state(ID).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.iteration_count, 1);
    assert!(after.is_score_estimated);
}

#[tokio::test]
async fn test_iteration_limit_blocks_reanalysis_and_fixes() {
    let config = RefinementConfig {
        max_iterations: 2,
        ..RefinementConfig::default()
    };
    let (engine, evaluator, fix_applier, _) = test_loop(config);
    let mut content = treatment();

    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    let second = engine
        .run_analysis(&content, AnalysisOptions::reanalysis())
        .await
        .unwrap();
    assert_eq!(second.iteration, 2);
    assert_eq!(second.phase, LoopPhase::Exhausted);

    let err = engine
        .run_analysis(&content, AnalysisOptions::reanalysis())
        .await
        .unwrap_err();
    assert!(matches!(err, RefinementError::IterationLimit { max: 2 }));

    let err = engine.apply_fix(&mut content, &pacing_insight()).await.unwrap_err();
    assert!(matches!(err, RefinementError::IterationLimit { max: 2 }));

    assert_eq!(evaluator.calls(), 2);
    assert_eq!(fix_applier.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_operation_is_rejected() {
    let (engine, evaluator, _, _) =
        test_loop_with(MockEvaluator::new().with_delay(Duration::from_millis(200)), RefinementConfig::default());
    let content = treatment();

    let (first, second, phase) = tokio::join!(
        engine.run_analysis(&content, AnalysisOptions::initial()),
        engine.reset(ID),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            engine.phase(ID).await
        },
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(RefinementError::OperationInProgress)));
    assert_eq!(phase.unwrap(), LoopPhase::Analyzing);
    assert_eq!(evaluator.calls(), 1);

    // The guard is released once the first operation completes.
    engine.reset(ID).await.unwrap();
}

#[tokio::test]
async fn test_intent_change_while_unlocked_updates_in_place() {
    let (engine, _, _, store) = test_loop(RefinementConfig::default());

    let change = engine
        .change_intent_field(ID, IntentField::TargetDemographic, "young adults")
        .await
        .unwrap();

    assert_eq!(change, IntentChange::Updated);
    let state = store.get(ID).await.unwrap().unwrap();
    assert_eq!(state.intent.target_demographic, "young adults");
    assert!(!state.has_intent_lock);
}

#[tokio::test]
async fn test_intent_change_after_lock_keeps_baseline_for_next_analysis() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    let content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    let mut events = engine.subscribe();

    let change = engine
        .change_intent_field(ID, IntentField::TargetDemographic, "young adults")
        .await
        .unwrap();

    assert_eq!(change, IntentChange::SessionReset);
    assert_eq!(
        events.try_recv().unwrap(),
        RefinementEvent::SessionReset {
            content_id: ID.to_string(),
            baseline_kept: true,
        }
    );
    let state = engine.state(ID).await.unwrap();
    assert!(state.analysis.is_none());
    assert_eq!(state.previous_score, Some(64));
    assert_eq!(state.iteration_count, 0);
    assert!(!state.has_intent_lock);

    let outcome = engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    assert!(outcome.baseline_supplied);
    assert_eq!(outcome.iteration, 1);

    let request = evaluator.last_request().unwrap();
    assert_eq!(request.content_baseline.unwrap().score, 64);
    assert_eq!(request.intent.target_demographic, "young adults");
}

#[tokio::test]
async fn test_baseline_withheld_when_content_changed() {
    let (engine, evaluator, _, _) = test_loop(RefinementConfig::default());
    engine
        .run_analysis(&treatment(), AnalysisOptions::initial())
        .await
        .unwrap();
    engine
        .change_intent_field(ID, IntentField::ToneProfile, "whimsical")
        .await
        .unwrap();

    let mut edited = treatment();
    edited.synopsis.push_str(" Then the power fails.");
    let outcome = engine
        .run_analysis(&edited, AnalysisOptions::initial())
        .await
        .unwrap();

    assert!(!outcome.baseline_supplied);
    assert!(evaluator.last_request().unwrap().content_baseline.is_none());
}

#[tokio::test]
async fn test_reset_clears_everything_including_baseline() {
    let (engine, evaluator, _, store) = test_loop(RefinementConfig::default());
    let content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();

    engine.reset(ID).await.unwrap();

    assert!(store.get(ID).await.unwrap().is_none());
    assert_eq!(engine.phase(ID).await.unwrap(), LoopPhase::Idle);
    let state = engine.state(ID).await.unwrap();
    assert_eq!(state.previous_score, None);
    assert!(!state.has_intent_lock);

    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    assert!(evaluator.last_request().unwrap().content_baseline.is_none());
}

#[tokio::test]
async fn test_detected_intent_fills_empty_fields_until_locked() {
    let (engine, _, _, _) = test_loop(RefinementConfig::default());

    let detected = engine.sync_detected_intent(&treatment()).await.unwrap();
    assert_eq!(detected.primary_genre.as_deref(), Some("thriller"));
    assert_eq!(detected.tone_profile.as_deref(), Some("dark"));

    let state = engine.state(ID).await.unwrap();
    assert_eq!(state.intent.primary_genre, "thriller");
    assert_eq!(state.intent.tone_profile, "dark");

    engine
        .run_analysis(&treatment(), AnalysisOptions::initial())
        .await
        .unwrap();
    let comedy = treatment().with_genre("Comedy");
    engine.sync_detected_intent(&comedy).await.unwrap();
    assert_eq!(engine.state(ID).await.unwrap().intent.primary_genre, "thriller");
}

#[tokio::test]
async fn test_reset_after_fixes_clears_estimate_and_overrides() {
    let (engine, _, _, store) = test_loop(RefinementConfig::default());
    let mut content = treatment();
    engine
        .run_analysis(&content, AnalysisOptions::initial())
        .await
        .unwrap();
    engine.apply_all_fixes(&mut content).await.unwrap();
    let fixed = engine.state(ID).await.unwrap();
    assert!(fixed.is_score_estimated);
    assert!(!fixed.checkpoint_overrides.is_empty());

    engine.reset(ID).await.unwrap();

    assert!(store.get(ID).await.unwrap().is_none());
    let state = engine.state(ID).await.unwrap();
    assert_eq!(state.iteration_count, 0);
    assert!(!state.is_ready_for_production);
    assert!(state.checkpoint_overrides.is_empty());
    assert!(!state.is_score_estimated);
    assert_eq!(state.previous_score, None);
    assert_eq!(state.pending_fixes_count, 0);
    assert!(state.applied_fixes.is_empty());
    assert!(state.analysis.is_none());
    assert_eq!(engine.phase(ID).await.unwrap(), LoopPhase::Idle);
}
