//! `fix` and `fix-all` commands.

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::cli::context::{load_treatment, prepare_treatment_write, CliContext};
use crate::cli::output::{create_spinner, output, CommandOutput, ProgressBarExt};
use crate::services::{BatchFixOutcome, FixOutcome};

#[derive(Debug, Serialize)]
pub struct FixOutput {
    #[serde(flatten)]
    pub outcome: FixOutcome,
    pub file: String,
}

fn estimate_line(estimated: Option<u32>, ready: bool) -> Option<String> {
    estimated.map(|score| {
        let suffix = if ready { ", ready for production" } else { "" };
        format!("Estimated score: {score} (unverified{suffix}; run `resonance verify` to confirm)")
    })
}

impl CommandOutput for FixOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Applied fix {} to section '{}' in {}",
            self.outcome.insight_id, self.outcome.section, self.file
        )];
        lines.extend(estimate_line(self.outcome.estimated_score, self.outcome.ready_for_production));
        lines.push(format!("Pending fixes awaiting re-analysis: {}", self.outcome.pending_fixes));
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct FixAllOutput {
    #[serde(flatten)]
    pub outcome: BatchFixOutcome,
    pub file: String,
}

impl CommandOutput for FixAllOutput {
    fn to_human(&self) -> String {
        let outcome = &self.outcome;
        if outcome.applied.is_empty() && outcome.skipped.is_empty() {
            return "No outstanding fixes.".to_string();
        }

        let mut lines = vec![format!("Applied {} fix(es) to {}", outcome.applied.len(), self.file)];
        for id in &outcome.applied {
            lines.push(format!("  ✓ {id}"));
        }
        for skipped in &outcome.skipped {
            lines.push(format!("  - {} skipped: {}", skipped.insight_id, skipped.reason));
        }
        lines.extend(estimate_line(outcome.estimated_score, outcome.ready_for_production));
        lines.push(format!("Pending fixes awaiting re-analysis: {}", outcome.pending_fixes));
        lines.join("\n")
    }
}

pub async fn execute_one(file: &Path, insight_id: &str, json_mode: bool) -> Result<()> {
    let mut treatment = load_treatment(file)?;
    let ctx = CliContext::load().await?;

    let state = ctx.engine.state(&treatment.id).await?;
    let insight = state
        .analysis
        .as_ref()
        .and_then(|a| a.insight(insight_id))
        .cloned()
        .ok_or_else(|| anyhow!("No insight '{insight_id}' in the current analysis. Run `resonance status` to list insights."))?;

    // Fail on an unwritable file before the session records the fix.
    let write = prepare_treatment_write(file)?;
    let spinner = create_spinner(format!("Applying fix {insight_id}..."), json_mode);
    let outcome = match ctx.engine.apply_fix(&mut treatment, &insight).await {
        Ok(outcome) => {
            spinner.finish_success("Fix applied");
            outcome
        }
        Err(err) => {
            spinner.finish_error("Fix failed");
            return Err(anyhow!(err.user_message()));
        }
    };

    write.commit(&treatment)?;
    output(
        &FixOutput {
            outcome,
            file: file.display().to_string(),
        },
        json_mode,
    );
    Ok(())
}

pub async fn execute_all(file: &Path, json_mode: bool) -> Result<()> {
    let mut treatment = load_treatment(file)?;
    let ctx = CliContext::load().await?;

    let write = prepare_treatment_write(file)?;
    let spinner = create_spinner("Applying fixes...", json_mode);
    let outcome = match ctx.engine.apply_all_fixes(&mut treatment).await {
        Ok(outcome) => {
            spinner.finish_success("Fixes applied");
            outcome
        }
        Err(err) => {
            spinner.finish_error("Fixes failed");
            return Err(anyhow!(err.user_message()));
        }
    };

    if !outcome.applied.is_empty() {
        write.commit(&treatment)?;
    }
    output(
        &FixAllOutput {
            outcome,
            file: file.display().to_string(),
        },
        json_mode,
    );
    Ok(())
}
