//! Domain layer for the Resonance refinement engine
//!
//! This module contains the core data model, the ports to external
//! collaborators, and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult, RefinementError, RefinementResult};
