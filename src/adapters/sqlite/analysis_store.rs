//! SQLite implementation of the AnalysisStore.
//!
//! One row per content identifier holding the whole session as JSON.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AnalysisState, AnalysisStatePatch};
use crate::domain::ports::AnalysisStore;

#[derive(Clone)]
pub struct SqliteAnalysisStore {
    pool: SqlitePool,
}

impl SqliteAnalysisStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Identifiers of every stored session, most recently updated first.
    pub async fn list_content_ids(&self) -> DomainResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT content_id FROM analysis_states ORDER BY updated_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[derive(sqlx::FromRow)]
struct AnalysisStateRow {
    state_json: String,
}

#[async_trait]
impl AnalysisStore for SqliteAnalysisStore {
    async fn get(&self, content_id: &str) -> DomainResult<Option<AnalysisState>> {
        let row: Option<AnalysisStateRow> =
            sqlx::query_as("SELECT state_json FROM analysis_states WHERE content_id = ?")
                .bind(content_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(r) => Ok(Some(serde_json::from_str::<AnalysisState>(&r.state_json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, content_id: &str, patch: AnalysisStatePatch) -> DomainResult<()> {
        let mut state = self.get(content_id).await?.unwrap_or_default();
        state.apply_patch(patch);
        let state_json = serde_json::to_string(&state)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO analysis_states (content_id, state_json, created_at, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(content_id) DO UPDATE SET state_json = excluded.state_json, updated_at = excluded.updated_at"#
        )
        .bind(content_id)
        .bind(&state_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, content_id: &str) -> DomainResult<()> {
        sqlx::query("DELETE FROM analysis_states WHERE content_id = ?")
            .bind(content_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
