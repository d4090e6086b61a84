//! Fix-applier port: rewrites one scoped section of a treatment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::evaluator::CollaboratorError;
use crate::domain::models::{Treatment, TreatmentPatch};

/// Request sent to the fix applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixRequest {
    pub content: Treatment,
    pub section: String,
    pub instruction: String,
}

/// The external AI fix applier.
#[async_trait]
pub trait FixApplier: Send + Sync {
    /// Rewrite the requested section and return the resulting partial patch.
    async fn apply_fix(&self, request: &FixRequest) -> Result<TreatmentPatch, CollaboratorError>;
}
