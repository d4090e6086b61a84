//! `analyze`, `reanalyze` and `verify` commands.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::cli::context::{drain_events, load_treatment, CliContext};
use crate::cli::output::{create_spinner, format_delta, output, CommandOutput, ProgressBarExt};
use crate::domain::models::{InsightKind, ScoreTier};
use crate::services::{AnalysisOptions, AnalysisOutcome, RefinementEvent};

/// Which flavour of analysis to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeMode {
    Initial { quick: bool },
    Reanalysis,
    Verify,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeOutput {
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub max_iterations: u32,
    pub intent_locked: bool,
    pub weaknesses: Vec<String>,
}

impl CommandOutput for AnalyzeOutput {
    fn to_human(&self) -> String {
        let outcome = &self.outcome;
        let tier = match outcome.tier {
            ScoreTier::MarketReady => "market ready",
            ScoreTier::StrongPotential => "strong potential",
            ScoreTier::NeedsRefinement => "needs refinement",
        };
        let mut lines = vec![format!(
            "Greenlight score: {} ({tier}, confidence {:.0}%)",
            outcome.score,
            outcome.confidence * 100.0
        )];
        if let Some(delta) = outcome.delta {
            lines.push(format!("Change since last analysis: {}", format_delta(delta)));
        }
        lines.push(format!("Iteration: {}/{}", outcome.iteration, self.max_iterations));
        lines.push(format!("Phase: {}", outcome.phase.as_str()));
        if self.intent_locked {
            lines.push("Intent locked for this session.".to_string());
        }
        if outcome.baseline_supplied {
            lines.push("Scored against the previous baseline (intent changed, content unchanged).".to_string());
        }
        if outcome.ready_for_production {
            lines.push("Ready for production.".to_string());
        } else if !self.weaknesses.is_empty() {
            lines.push("\nWeaknesses:".to_string());
            for weakness in &self.weaknesses {
                lines.push(format!("  - {weakness}"));
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(file: &Path, mode: AnalyzeMode, json_mode: bool) -> Result<()> {
    let treatment = load_treatment(file)?;
    let ctx = CliContext::load().await?;
    let mut events = ctx.engine.subscribe();

    let message = match mode {
        AnalyzeMode::Initial { .. } => "Analyzing treatment...",
        AnalyzeMode::Reanalysis => "Re-analyzing treatment...",
        AnalyzeMode::Verify => "Verifying estimated score...",
    };
    let spinner = create_spinner(message, json_mode);

    let result = match mode {
        AnalyzeMode::Initial { quick } => {
            let options = if quick { AnalysisOptions::quick() } else { AnalysisOptions::initial() };
            ctx.engine.run_analysis(&treatment, options).await
        }
        AnalyzeMode::Reanalysis => ctx.engine.run_analysis(&treatment, AnalysisOptions::reanalysis()).await,
        AnalyzeMode::Verify => ctx.engine.verify_score(&treatment).await,
    };

    let outcome = match result {
        Ok(outcome) => {
            spinner.finish_success("Analysis complete");
            outcome
        }
        Err(err) => {
            spinner.finish_error("Analysis failed");
            return Err(anyhow::anyhow!(err.user_message()));
        }
    };

    let intent_locked = drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, RefinementEvent::IntentLocked { .. }));

    let state = ctx.engine.state(&treatment.id).await?;
    let weaknesses = state
        .analysis
        .as_ref()
        .map(|a| {
            a.insights
                .iter()
                .filter(|i| i.kind == InsightKind::Weakness)
                .map(|i| format!("[{}] {}", i.id, i.title))
                .collect()
        })
        .unwrap_or_default();

    let result = AnalyzeOutput {
        outcome,
        max_iterations: ctx.config.refinement.max_iterations,
        intent_locked,
        weaknesses,
    };
    output(&result, json_mode);
    Ok(())
}
