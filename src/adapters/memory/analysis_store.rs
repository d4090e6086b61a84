//! In-memory implementation of the AnalysisStore.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AnalysisState, AnalysisStatePatch};
use crate::domain::ports::AnalysisStore;

/// Session store backed by a map; contents are lost when dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnalysisStore {
    sessions: Arc<RwLock<HashMap<String, AnalysisState>>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn get(&self, content_id: &str) -> DomainResult<Option<AnalysisState>> {
        Ok(self.sessions.read().await.get(content_id).cloned())
    }

    async fn set(&self, content_id: &str, patch: AnalysisStatePatch) -> DomainResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(content_id.to_string()).or_default().apply_patch(patch);
        Ok(())
    }

    async fn clear(&self, content_id: &str) -> DomainResult<()> {
        self.sessions.write().await.remove(content_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Intent;

    #[tokio::test]
    async fn test_set_creates_then_merges() {
        let store = InMemoryAnalysisStore::new();
        assert!(store.is_empty().await);

        let mut state = AnalysisState::default();
        state.iteration_count = 3;
        store.set("t-1", AnalysisStatePatch::full(&state)).await.unwrap();
        store
            .set("t-1", AnalysisStatePatch::intent(Intent::new("comedy", "families", "whimsical")))
            .await
            .unwrap();

        let stored = store.get("t-1").await.unwrap().unwrap();
        assert_eq!(stored.iteration_count, 3);
        assert_eq!(stored.intent.tone_profile, "whimsical");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = InMemoryAnalysisStore::new();
        store.set("t-1", AnalysisStatePatch::default()).await.unwrap();
        store.clear("t-1").await.unwrap();
        store.clear("t-1").await.unwrap();
        assert!(store.get("t-1").await.unwrap().is_none());
    }
}
