//! HTTP evaluator adapter.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{read_body, status_reason, EndpointClient};
use std::collections::BTreeMap;

use crate::domain::models::{
    Analysis, Axis, AxisScore, Checkpoint, CheckpointResults, EndpointConfig, GreenlightScore,
    Insight, MAX_CHECKPOINT_SCORE,
};
use crate::domain::ports::{CollaboratorError, EvaluateRequest, EvaluationOutcome, Evaluator};

/// Evaluator reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEvaluator {
    client: EndpointClient,
}

impl HttpEvaluator {
    pub fn new(config: &EndpointConfig) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: EndpointClient::new(config)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    analysis: Option<WireAnalysis>,
    #[serde(default)]
    ready_for_production: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAnalysis {
    greenlight_score: WireGreenlight,
    #[serde(default)]
    axes: Vec<AxisScore>,
    #[serde(default)]
    insights: Vec<Insight>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    checkpoint_results: BTreeMap<Axis, BTreeMap<String, WireCheckpoint>>,
    #[serde(default)]
    credits_used: u32,
}

/// Checkpoint as sent on the wire; id and axis come from the map keys.
#[derive(Debug, Deserialize)]
struct WireCheckpoint {
    #[serde(default)]
    passed: bool,
    #[serde(default)]
    score: Option<f64>,
}

/// Score as sent on the wire; the tier is always derived locally.
#[derive(Debug, Deserialize)]
struct WireGreenlight {
    score: f64,
    #[serde(default)]
    confidence: Option<f64>,
}

impl From<WireAnalysis> for Analysis {
    fn from(wire: WireAnalysis) -> Self {
        let score = wire.greenlight_score.score.round().clamp(0.0, 100.0) as u32;
        Self {
            greenlight_score: GreenlightScore::new(score, wire.greenlight_score.confidence.unwrap_or(0.0)),
            axes: wire.axes,
            insights: wire.insights,
            recommendations: wire.recommendations,
            checkpoint_results: into_checkpoint_results(wire.checkpoint_results),
            credits_used: wire.credits_used,
        }
    }
}

fn into_checkpoint_results(wire: BTreeMap<Axis, BTreeMap<String, WireCheckpoint>>) -> CheckpointResults {
    wire.into_iter()
        .map(|(axis, checkpoints)| {
            let checkpoints = checkpoints
                .into_iter()
                .map(|(id, c)| {
                    let mut checkpoint = Checkpoint::new(id.clone(), axis, c.passed);
                    checkpoint.score = c.score.map(|s| s.clamp(0.0, MAX_CHECKPOINT_SCORE));
                    (id, checkpoint)
                })
                .collect();
            (axis, checkpoints)
        })
        .collect()
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationOutcome, CollaboratorError> {
        debug!(
            url = self.client.url(),
            content_id = %request.content_id,
            iteration = request.iteration,
            "POST evaluate"
        );
        let response = self.client.post(request).await?;
        let status = response.status();
        let body = read_body(response).await?;

        let envelope: EvaluateEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(CollaboratorError::InvalidResponse(format!("malformed evaluator response: {e}")));
            }
            Err(_) => return Err(CollaboratorError::Rejected(status_reason(status, &body))),
        };

        if !envelope.success || !status.is_success() {
            let reason = envelope.error.unwrap_or_else(|| status_reason(status, ""));
            warn!(content_id = %request.content_id, %status, reason = %reason, "evaluator reported failure");
            return Err(CollaboratorError::Rejected(reason));
        }

        let analysis = envelope
            .analysis
            .ok_or_else(|| CollaboratorError::InvalidResponse("evaluator response has no analysis".to_string()))?;

        Ok(EvaluationOutcome {
            analysis: analysis.into(),
            ready_for_production: envelope.ready_for_production,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_analysis_normalizes_score_and_checkpoints() {
        let wire: WireAnalysis = serde_json::from_value(serde_json::json!({
            "greenlightScore": { "score": 71.6, "confidence": 0.8, "tier": "ignored" },
            "checkpointResults": {
                "pacing": { "p1": { "passed": false, "score": 4 } },
                "characterDepth": { "c1": { "passed": true } }
            },
            "creditsUsed": 3
        }))
        .unwrap();

        let analysis = Analysis::from(wire);
        assert_eq!(analysis.score(), 72);
        assert_eq!(analysis.credits_used, 3);
        let p1 = &analysis.checkpoint_results[&Axis::Pacing]["p1"];
        assert_eq!(p1.axis_id, Axis::Pacing);
        assert_eq!(p1.score, Some(4.0));
        assert!(analysis.checkpoint_results[&Axis::CharacterDepth]["c1"].passed);
    }
}
