//! HTTP adapters for the external evaluator and fix-applier services.
//!
//! Both services answer with a permissive `{success, ..., error?}` envelope;
//! the adapters turn it into typed results so the engine never inspects
//! untyped payloads.

pub mod evaluator;
pub mod fix_applier;

pub use evaluator::HttpEvaluator;
pub use fix_applier::HttpFixApplier;

use std::time::Duration;

use reqwest::{Client as ReqwestClient, Response};
use serde::Serialize;

use crate::domain::models::EndpointConfig;
use crate::domain::ports::CollaboratorError;

/// Shared JSON POST client for one configured endpoint.
#[derive(Debug, Clone)]
pub(crate) struct EndpointClient {
    http_client: ReqwestClient,
    url: String,
    api_key: Option<String>,
}

impl EndpointClient {
    pub(crate) fn new(config: &EndpointConfig) -> Result<Self, CollaboratorError> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| CollaboratorError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            url: config.url.clone(),
            api_key: config.get_api_key(),
        })
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// POST a JSON body and return the raw response body on any status.
    ///
    /// Non-success statuses are still read: the services report failures
    /// through the envelope's `error`/`message` field.
    pub(crate) async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<Response, CollaboratorError> {
        let mut request = self.http_client.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                CollaboratorError::Unreachable(format!("request to {} timed out", self.url))
            } else {
                CollaboratorError::Unreachable(e.to_string())
            }
        })
    }
}

/// Read a response body as text, mapping transport failures.
pub(crate) async fn read_body(response: Response) -> Result<String, CollaboratorError> {
    response
        .text()
        .await
        .map_err(|e| CollaboratorError::InvalidResponse(format!("failed to read response body: {e}")))
}

/// Best-effort failure reason from a non-JSON or empty body.
pub(crate) fn status_reason(status: reqwest::StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        let snippet: String = body.chars().take(200).collect();
        format!("HTTP {status}: {snippet}")
    }
}
