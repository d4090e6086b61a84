//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::commands::intent::IntentArgs;

#[derive(Parser)]
#[command(name = "resonance")]
#[command(about = "Resonance - iterative treatment refinement against an AI evaluator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the first analysis of a treatment (locks the intent)
    Analyze {
        /// Treatment file (YAML or JSON)
        file: PathBuf,

        /// Ask for a cheaper, shallower analysis
        #[arg(short, long)]
        quick: bool,
    },

    /// Re-analyze after applying fixes (consumes one iteration)
    Reanalyze {
        /// Treatment file (YAML or JSON)
        file: PathBuf,
    },

    /// Replace an estimated score with a verified one
    Verify {
        /// Treatment file (YAML or JSON)
        file: PathBuf,
    },

    /// Apply the fix suggested by one insight and write the treatment back
    Fix {
        /// Treatment file (YAML or JSON)
        file: PathBuf,

        /// Insight ID
        insight_id: String,
    },

    /// Apply every outstanding weakness fix and write the treatment back
    FixAll {
        /// Treatment file (YAML or JSON)
        file: PathBuf,
    },

    /// Show the refinement session for a treatment
    Status {
        /// Treatment file (YAML or JSON)
        file: PathBuf,
    },

    /// Clear the refinement session for a treatment
    Reset {
        /// Treatment file (YAML or JSON)
        file: PathBuf,
    },

    /// Inspect or change the targeting intent
    Intent(IntentArgs),
}
