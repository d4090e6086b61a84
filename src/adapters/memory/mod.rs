//! In-memory adapters.

pub mod analysis_store;

pub use analysis_store::InMemoryAnalysisStore;
