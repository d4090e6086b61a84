//! Resonance CLI entry point.

use clap::Parser;

use resonance::cli::{Cli, Commands};
use resonance::cli::commands::{analyze, fix, intent, reset, status};
use resonance::infrastructure::config::ConfigLoader;
use resonance::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging follows the configured level; a broken config is reported by
    // the command itself.
    let mut log_config = ConfigLoader::load()
        .map(|config| LogConfig::from(&config.logging))
        .unwrap_or_default();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    } else if cli.json {
        log_config = log_config.with_level("warn");
    }
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err}");
            None
        }
    };

    let result = match &cli.command {
        Commands::Analyze { file, quick } => {
            analyze::execute(file, analyze::AnalyzeMode::Initial { quick: *quick }, cli.json).await
        }
        Commands::Reanalyze { file } => analyze::execute(file, analyze::AnalyzeMode::Reanalysis, cli.json).await,
        Commands::Verify { file } => analyze::execute(file, analyze::AnalyzeMode::Verify, cli.json).await,
        Commands::Fix { file, insight_id } => fix::execute_one(file, insight_id, cli.json).await,
        Commands::FixAll { file } => fix::execute_all(file, cli.json).await,
        Commands::Status { file } => status::execute(file, cli.json).await,
        Commands::Reset { file } => reset::execute(file, cli.json).await,
        Commands::Intent(args) => intent::execute(args.clone(), cli.json).await,
    };

    if let Err(err) = result {
        resonance::cli::handle_error(err, cli.json);
    }
}
