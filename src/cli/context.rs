//! Wiring shared by the CLI commands: configuration, the session store,
//! the HTTP collaborators and the refinement loop, plus treatment file IO.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;
use tokio::sync::broadcast;

use crate::adapters::http::{HttpEvaluator, HttpFixApplier};
use crate::adapters::sqlite::{initialize_from_config, SqliteAnalysisStore};
use crate::domain::models::{Config, Treatment};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{RefinementEvent, RefinementLoop};

/// The refinement loop as wired for the command line.
pub type CliLoop = RefinementLoop<HttpEvaluator, HttpFixApplier, SqliteAnalysisStore>;

pub struct CliContext {
    pub config: Config,
    pub engine: CliLoop,
}

impl CliContext {
    /// Build the context from an already loaded configuration.
    pub async fn from_config(config: Config) -> Result<Self> {
        let pool = initialize_from_config(&config.database)
            .await
            .with_context(|| format!("Failed to open session database at {}", config.database.path))?;

        let evaluator = HttpEvaluator::new(&config.evaluator).context("Failed to set up evaluator client")?;
        let fix_applier = HttpFixApplier::new(&config.fix_applier).context("Failed to set up fix-applier client")?;
        let store = SqliteAnalysisStore::new(pool);

        let engine = RefinementLoop::new(
            Arc::new(evaluator),
            Arc::new(fix_applier),
            Arc::new(store),
            config.refinement.clone(),
        );
        Ok(Self { config, engine })
    }

    /// Load configuration from the project directory and build the context.
    pub async fn load() -> Result<Self> {
        let config = ConfigLoader::load().context("Failed to load configuration")?;
        Self::from_config(config).await
    }
}

/// Events published so far on a subscription, without waiting.
pub fn drain_events(events: &mut broadcast::Receiver<RefinementEvent>) -> Vec<RefinementEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Read a treatment from a YAML or JSON file.
///
/// A file without an `id` is identified by its file stem.
pub fn load_treatment(path: &Path) -> Result<Treatment> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read treatment file {}", path.display()))?;

    // YAML is a superset of JSON, one parser covers both.
    let mut value: serde_json::Value = serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse treatment file {}", path.display()))?;

    let serde_json::Value::Object(fields) = &mut value else {
        bail!("Treatment file {} must contain a mapping", path.display());
    };
    if !fields.contains_key("id") {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        fields.insert("id".to_string(), serde_json::Value::String(stem));
    }

    serde_json::from_value(value)
        .with_context(|| format!("Invalid treatment in {}", path.display()))
}

/// A treatment write whose target was checked before any work started.
///
/// The rendered text goes to a temporary file next to the target and
/// replaces it in one rename on [`commit`](Self::commit). Dropping the
/// value without committing leaves the target untouched.
#[derive(Debug)]
pub struct PendingTreatmentWrite {
    path: PathBuf,
    staged: NamedTempFile,
}

/// Check that a treatment file can be rewritten and stage its replacement.
pub fn prepare_treatment_write(path: &Path) -> Result<PendingTreatmentWrite> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("Treatment file {} is not writable", path.display()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot stage a write in {}", dir.display()))?;

    Ok(PendingTreatmentWrite {
        path: path.to_path_buf(),
        staged,
    })
}

impl PendingTreatmentWrite {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the treatment in the format the file extension implies and
    /// swap it into place.
    pub fn commit(mut self, treatment: &Treatment) -> Result<()> {
        let text = render_treatment(&self.path, treatment)?;
        let file = self.staged.as_file_mut();
        file.write_all(text.as_bytes())
            .with_context(|| format!("Failed to write treatment file {}", self.path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to flush treatment file {}", self.path.display()))?;

        if let Ok(metadata) = std::fs::metadata(&self.path) {
            // Keep the original mode; the temporary file is created owner-only.
            let _ = std::fs::set_permissions(self.staged.path(), metadata.permissions());
        }

        self.staged
            .persist(&self.path)
            .with_context(|| format!("Failed to replace treatment file {}", self.path.display()))?;
        Ok(())
    }
}

fn render_treatment(path: &Path, treatment: &Treatment) -> Result<String> {
    let text = if is_json_path(path) {
        serde_json::to_string_pretty(treatment)?
    } else {
        serde_yaml::to_string(treatment)?
    };
    Ok(text)
}
