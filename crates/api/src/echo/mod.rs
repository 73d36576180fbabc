//! Component generation from a natural-language demand.
//!
//! The hub hands an [`EchoRequest`] to an [`EchoGenerator`] and persists the
//! returned components as ordinary tree creations. Generation itself lives
//! in an external service.

use std::time::Duration;

use async_trait::async_trait;
use canopy_core::component::ComponentNode;
use canopy_core::types::DbId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generation is slow; allow well over the HTTP request timeout.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum EchoError {
    #[error("Echo request is missing a demand")]
    MissingDemand,

    #[error("Echo service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Echo service returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Echo is not configured on this server")]
    Disabled,
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoRequest {
    #[serde(rename = "appID")]
    pub app_id: DbId,
    pub demand: String,
    /// Client-supplied hints (selected component, theme), passed through.
    pub context: Value,
}

impl EchoRequest {
    /// Read a payload element: a bare demand string or `{demand, context}`.
    pub fn from_payload(app_id: DbId, element: &Value) -> Result<Self, EchoError> {
        let (demand, context) = match element {
            Value::String(s) => (s.as_str(), Value::Null),
            Value::Object(map) => (
                map.get("demand").and_then(Value::as_str).unwrap_or_default(),
                map.get("context").cloned().unwrap_or(Value::Null),
            ),
            _ => ("", Value::Null),
        };
        let demand = demand.trim();
        if demand.is_empty() {
            return Err(EchoError::MissingDemand);
        }
        Ok(Self {
            app_id,
            demand: demand.to_string(),
            context,
        })
    }
}

#[async_trait]
pub trait EchoGenerator: Send + Sync {
    /// Produce top-level components for `request`. Each node's
    /// `parentNode` names where it attaches.
    async fn generate(&self, request: &EchoRequest) -> Result<Vec<ComponentNode>, EchoError>;
}

/// Response body of the echo service.
#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Wrapped { components: Vec<ComponentNode> },
    Bare(Vec<ComponentNode>),
}

/// [`EchoGenerator`] that POSTs to an HTTP endpoint.
pub struct HttpEchoGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEchoGenerator {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, EchoError> {
        let client = reqwest::Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl EchoGenerator for HttpEchoGenerator {
    async fn generate(&self, request: &EchoRequest) -> Result<Vec<ComponentNode>, EchoError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EchoError::HttpStatus(status.as_u16()));
        }
        let components = match response.json::<GenerateResponse>().await? {
            GenerateResponse::Wrapped { components } | GenerateResponse::Bare(components) => {
                components
            }
        };
        tracing::debug!(app_id = request.app_id, count = components.len(), "Echo generated components");
        Ok(components)
    }
}
