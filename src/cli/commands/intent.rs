//! `intent` commands.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::{load_treatment, CliContext};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{DetectedIntent, Intent, IntentField};
use crate::services::IntentChange;

#[derive(Args, Debug, Clone)]
pub struct IntentArgs {
    /// Treatment file (YAML or JSON)
    pub file: PathBuf,

    #[command(subcommand)]
    pub command: IntentCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum IntentCommands {
    /// Set one intent field (resets the session if the intent is locked)
    Set {
        /// Field: primary_genre, target_demographic or tone_profile
        field: String,
        /// New value
        value: String,
    },
    /// Fill empty intent fields from the treatment's genre and tone
    Detect,
    /// Show the current intent
    Show,
}

#[derive(Debug, Serialize)]
pub struct IntentOutput {
    pub content_id: String,
    pub intent: Intent,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected: Option<DetectedIntent>,
}

fn display(value: &str) -> &str {
    if value.trim().is_empty() { "(unset)" } else { value }
}

impl CommandOutput for IntentOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        match self.change.as_deref() {
            Some("session_reset") => lines.push(
                "Intent changed on a locked session: the session was reset. \
                 The previous score is kept as a baseline."
                    .to_string(),
            ),
            Some("updated") => lines.push("Intent updated.".to_string()),
            Some("unchanged") => lines.push("Intent unchanged.".to_string()),
            _ => {}
        }
        if let Some(detected) = &self.detected {
            if detected.is_empty() {
                lines.push("Nothing detected from the treatment.".to_string());
            }
        }
        lines.push(format!("Primary genre:      {}", display(&self.intent.primary_genre)));
        lines.push(format!("Target demographic: {}", display(&self.intent.target_demographic)));
        lines.push(format!("Tone profile:       {}", display(&self.intent.tone_profile)));
        lines.push(format!("Locked: {}", if self.locked { "yes" } else { "no" }));
        lines.join("\n")
    }
}

const fn change_name(change: IntentChange) -> &'static str {
    match change {
        IntentChange::Unchanged => "unchanged",
        IntentChange::Updated => "updated",
        IntentChange::SessionReset => "session_reset",
    }
}

pub async fn execute(args: IntentArgs, json_mode: bool) -> Result<()> {
    let treatment = load_treatment(&args.file)?;
    let ctx = CliContext::load().await?;

    let (change, detected) = match args.command {
        IntentCommands::Set { field, value } => {
            let field = IntentField::from_str(&field).ok_or_else(|| {
                anyhow!("Invalid intent field: {field}. Use primary_genre, target_demographic or tone_profile")
            })?;
            let change = ctx
                .engine
                .change_intent_field(&treatment.id, field, value.trim())
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            (Some(change_name(change).to_string()), None)
        }
        IntentCommands::Detect => {
            let detected = ctx
                .engine
                .sync_detected_intent(&treatment)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            (None, Some(detected))
        }
        IntentCommands::Show => (None, None),
    };

    let state = ctx.engine.state(&treatment.id).await?;
    output(
        &IntentOutput {
            content_id: treatment.id,
            intent: state.intent,
            locked: state.has_intent_lock,
            change,
            detected,
        },
        json_mode,
    );
    Ok(())
}
