//! `reset` command.

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::cli::context::{load_treatment, CliContext};
use crate::cli::output::{output, CommandOutput};

#[derive(Debug, Serialize)]
pub struct ResetOutput {
    pub content_id: String,
    pub message: String,
}

impl CommandOutput for ResetOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

pub async fn execute(file: &Path, json_mode: bool) -> Result<()> {
    let treatment = load_treatment(file)?;
    let ctx = CliContext::load().await?;

    ctx.engine
        .reset(&treatment.id)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    output(
        &ResetOutput {
            message: format!("Session for '{}' cleared.", treatment.id),
            content_id: treatment.id,
        },
        json_mode,
    );
    Ok(())
}
