//! Infrastructure layer module
//!
//! Cross-cutting runtime concerns:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)

pub mod config;
pub mod logging;
