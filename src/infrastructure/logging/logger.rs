use super::config::{LogConfig, LogFormat, RotationPolicy};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const LOG_FILE_PREFIX: &str = "resonance.log";

/// Logger implementation using tracing
pub struct LoggerImpl {
    _guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Initialize the global subscriber with the given configuration
    ///
    /// The returned logger holds the file writer's guard; drop it only at
    /// process exit or buffered file lines are lost.
    ///
    /// # Errors
    /// Returns an error for an invalid level or if a global subscriber is
    /// already installed.
    pub fn init(config: &LogConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;
        let env_filter = || {
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy()
        };

        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        if config.enable_stderr {
            layers.push(match config.format {
                LogFormat::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_target(true)
                    .with_filter(env_filter())
                    .boxed(),
                LogFormat::Pretty => tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(io::stderr)
                    .with_target(false)
                    .with_filter(env_filter())
                    .boxed(),
            });
        }

        let mut pruned = 0;
        let guard = match &config.log_dir {
            Some(log_dir) => {
                std::fs::create_dir_all(log_dir)
                    .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
                pruned = prune_old_logs(log_dir, config.retention_days, Utc::now())?;

                let file_appender = match config.rotation {
                    RotationPolicy::Daily => rolling::daily(log_dir, LOG_FILE_PREFIX),
                    RotationPolicy::Hourly => rolling::hourly(log_dir, LOG_FILE_PREFIX),
                    RotationPolicy::Never => rolling::never(log_dir, LOG_FILE_PREFIX),
                };
                let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

                // File layer - always JSON for structured logging
                layers.push(tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking_file)
                    .with_ansi(false)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(env_filter())
                    .boxed());
                Some(guard)
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .context("failed to install global tracing subscriber")?;

        tracing::debug!(
            level = %config.level,
            format = ?config.format,
            file_output = config.log_dir.is_some(),
            "logger initialized"
        );
        if pruned > 0 {
            tracing::info!(removed = pruned, "removed expired log files");
        }

        Ok(Self { _guard: guard })
    }
}

/// Parse log level string to Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

/// Delete rolled log files older than the retention window.
///
/// Only files named after the log prefix are considered. Returns the number
/// of files removed.
fn prune_old_logs(log_dir: &Path, retention_days: u32, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = now - Duration::days(i64::from(retention_days));
    let mut removed = 0;

    for entry in std::fs::read_dir(log_dir).context("failed to read log directory")? {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let modified: DateTime<Utc> = entry.metadata()?.modified()?.into();
        if modified < cutoff {
            std::fs::remove_file(entry.path())
                .with_context(|| format!("failed to remove {}", entry.path().display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("debug"), Ok(Level::DEBUG)));
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("error"), Ok(Level::ERROR)));
        assert!(matches!(parse_log_level("TRACE"), Ok(Level::TRACE)));
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_prune_keeps_recent_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("resonance.log.2026-01-01"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        // Files were just written, so nothing is older than the window.
        let removed = prune_old_logs(dir.path(), 30, Utc::now()).unwrap();
        assert_eq!(removed, 0);

        // Pretend a year has passed: only the log file expires.
        let removed = prune_old_logs(dir.path(), 30, Utc::now() + Duration::days(365)).unwrap();
        assert_eq!(removed, 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_logger_init_rejects_bad_level() {
        let config = LogConfig::default().with_level("loud");
        assert!(LoggerImpl::init(&config).is_err());
    }
}
