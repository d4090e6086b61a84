//! `status` command.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::cli::context::{load_treatment, CliContext};
use crate::cli::output::{CommandOutput, TableFormatter, output};
use crate::domain::models::{AnalysisState, LoopPhase};

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub content_id: String,
    pub phase: LoopPhase,
    pub max_iterations: u32,
    pub ready_threshold: u32,
    #[serde(flatten)]
    pub state: AnalysisState,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let state = &self.state;
        let mut lines = vec![
            format!("Treatment: {}", self.content_id),
            format!("Phase: {}", self.phase.as_str()),
        ];

        let Some(analysis) = &state.analysis else {
            if let Some(previous) = state.previous_score {
                lines.push(format!("No current analysis (baseline score {previous} kept)."));
            } else {
                lines.push("No analysis yet. Run `resonance analyze` first.".to_string());
            }
            return lines.join("\n");
        };

        let estimated = if state.is_score_estimated { " (estimated)" } else { "" };
        lines.push(format!(
            "Score: {}{estimated} / threshold {} [{}]",
            analysis.score(),
            self.ready_threshold,
            analysis.greenlight_score.tier.as_str()
        ));
        lines.push(format!("Iteration: {}/{}", state.iteration_count, self.max_iterations));
        lines.push(format!(
            "Fixes applied: {} ({} pending re-analysis)",
            state.applied_fixes.len(),
            state.pending_fixes_count
        ));
        lines.push(format!("Intent locked: {}", if state.has_intent_lock { "yes" } else { "no" }));

        let formatter = TableFormatter::new();
        lines.push(String::new());
        lines.push(formatter.format_axes(&analysis.axes));
        if !analysis.insights.is_empty() {
            lines.push(String::new());
            lines.push(formatter.format_insights(&analysis.insights, &state.applied_fixes));
        }
        if !analysis.recommendations.is_empty() {
            lines.push("\nRecommendations:".to_string());
            for recommendation in &analysis.recommendations {
                lines.push(format!("  - {recommendation}"));
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(file: &Path, json_mode: bool) -> Result<()> {
    let treatment = load_treatment(file)?;
    let ctx = CliContext::load().await?;

    let state = ctx.engine.state(&treatment.id).await?;
    let phase = ctx.engine.phase(&treatment.id).await?;

    output(
        &StatusOutput {
            content_id: treatment.id,
            phase,
            max_iterations: ctx.config.refinement.max_iterations,
            ready_threshold: ctx.config.refinement.ready_threshold,
            state,
        },
        json_mode,
    );
    Ok(())
}
