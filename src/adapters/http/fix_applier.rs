//! HTTP fix-applier adapter.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{read_body, status_reason, EndpointClient};
use crate::domain::models::{EndpointConfig, TreatmentPatch};
use crate::domain::ports::{CollaboratorError, FixApplier, FixRequest};

/// Fix applier reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFixApplier {
    client: EndpointClient,
}

impl HttpFixApplier {
    pub fn new(config: &EndpointConfig) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: EndpointClient::new(config)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FixEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    draft: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Keys a draft may echo back that are not treatment sections.
const NON_SECTION_KEYS: &[&str] = &["id"];

/// Turn a draft object into a patch, keeping only string-valued fields.
fn draft_to_patch(draft: serde_json::Value) -> Result<TreatmentPatch, CollaboratorError> {
    let serde_json::Value::Object(fields) = draft else {
        return Err(CollaboratorError::InvalidResponse("draft is not an object".to_string()));
    };
    let strings: serde_json::Map<String, serde_json::Value> = fields
        .into_iter()
        .filter(|(key, value)| value.is_string() && !NON_SECTION_KEYS.contains(&key.as_str()))
        .collect();

    serde_json::from_value(serde_json::Value::Object(strings))
        .map_err(|e| CollaboratorError::InvalidResponse(format!("malformed draft: {e}")))
}

#[async_trait]
impl FixApplier for HttpFixApplier {
    async fn apply_fix(&self, request: &FixRequest) -> Result<TreatmentPatch, CollaboratorError> {
        debug!(url = self.client.url(), section = %request.section, "POST apply fix");
        let response = self.client.post(request).await?;
        let status = response.status();
        let body = read_body(response).await?;

        let envelope: FixEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(CollaboratorError::InvalidResponse(format!("malformed fix response: {e}")));
            }
            Err(_) => return Err(CollaboratorError::Rejected(status_reason(status, &body))),
        };

        if !envelope.success || !status.is_success() {
            let reason = envelope.message.unwrap_or_else(|| status_reason(status, ""));
            warn!(section = %request.section, %status, reason = %reason, "fix applier reported failure");
            return Err(CollaboratorError::Rejected(reason));
        }

        let draft = envelope
            .draft
            .ok_or_else(|| CollaboratorError::InvalidResponse("fix response has no draft".to_string()))?;
        draft_to_patch(draft)
    }
}
