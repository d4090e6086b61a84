//! Analysis store port for session persistence.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AnalysisState, AnalysisStatePatch};

/// Durable storage of analysis sessions, one per content identifier.
///
/// Writes are last-writer-wins; there is no locking or transaction
/// discipline beyond overwriting the keys present in a patch.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Load the session snapshot for a content identifier.
    async fn get(&self, content_id: &str) -> DomainResult<Option<AnalysisState>>;

    /// Shallow-merge a partial snapshot into the stored session, creating
    /// it from defaults if absent.
    async fn set(&self, content_id: &str, patch: AnalysisStatePatch) -> DomainResult<()>;

    /// Remove the stored session entirely.
    async fn clear(&self, content_id: &str) -> DomainResult<()>;
}
