//! Resonance - scoring and iterative refinement of narrative treatments
//!
//! Resonance drives a bounded loop in which a treatment is scored by an
//! external AI evaluator, targeted fixes are applied section by section, and
//! the treatment is re-scored until it reaches a production-ready threshold
//! or the iteration budget runs out.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, ports and errors
//! - **Service Layer** (`services`): aggregation, intent management,
//!   reconciliation and the refinement loop controller
//! - **Adapters** (`adapters`): SQLite and in-memory session stores, HTTP
//!   evaluator and fix applier
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use resonance::adapters::memory::InMemoryAnalysisStore;
//! use resonance::services::{AnalysisOptions, RefinementLoop};
//!
//! let engine = RefinementLoop::new(evaluator, fix_applier, Arc::new(InMemoryAnalysisStore::new()), config);
//! let outcome = engine.run_analysis(&treatment, AnalysisOptions::initial()).await?;
//! println!("score {}", outcome.score);
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, RefinementError, RefinementResult};
pub use domain::models::{
    Analysis, AnalysisState, Axis, AxisWeights, Config, Insight, Intent, IntentField, LoopPhase,
    RefinementConfig, ScoreTier, Treatment,
};
pub use domain::ports::{AnalysisStore, Evaluator, FixApplier};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AnalysisOptions, RefinementEvent, RefinementLoop};
