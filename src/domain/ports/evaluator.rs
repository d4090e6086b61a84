//! Evaluator port: the boundary to the external AI evaluator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{AppliedFix, Analysis, Axis, Intent, TargetProfile, Treatment};

/// Failure reported by an external collaborator (evaluator or fix applier).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("service unreachable: {0}")]
    Unreachable(String),

    #[error("service rejected the request: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Context sent with a re-analysis so the evaluator can verify claimed
/// fixes incrementally instead of rescoring from nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousAnalysisContext {
    pub score: u32,
    pub axis_scores: BTreeMap<Axis, u32>,
    /// `axis.checkpoint` -> effective score, pending overrides included.
    pub checkpoint_scores: BTreeMap<String, f64>,
    /// Legacy list of checkpoint keys currently considered passed.
    pub passed_checkpoints: Vec<String>,
    pub applied_fixes: Vec<AppliedFix>,
}

/// Score anchor supplied when only targeting intent changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBaseline {
    pub score: u32,
    pub note: String,
}

/// Request sent to the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub content_id: String,
    pub content: Treatment,
    pub intent: Intent,
    pub quick_analysis: bool,
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_analysis: Option<PreviousAnalysisContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_profile: Option<TargetProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_baseline: Option<ContentBaseline>,
}

/// Successful evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    pub analysis: Analysis,
    /// The evaluator's own readiness verdict, if it sent one. Advisory only;
    /// readiness is always derived from the score.
    pub ready_for_production: Option<bool>,
}

/// The external AI evaluator.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate a treatment and return the authoritative analysis.
    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationOutcome, CollaboratorError>;
}
