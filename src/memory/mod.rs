//! External semantic-memory service client and its defensive wrapper.
//!
//! The memory service is an HTTP sidecar; everything here assumes it can
//! vanish at any moment. The [`defensive`] wrapper guarantees writes are
//! never lost and reads degrade to empty.

pub mod defensive;

pub use defensive::{DefensiveMemory, FlushStats};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MemoryError;

/// Default memory-service endpoint.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:37777";

/// One text block of a search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Block type; the service emits `text`.
    #[serde(rename = "type")]
    pub block_type: String,
    /// Block text.
    pub text: String,
}

/// Search response shape: `{content:[{type:"text", text}], isError?}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Result blocks, one per match.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Service-side error marker.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// Observation body for `POST /api/sessions/observations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationBody {
    /// Session the observation belongs to.
    #[serde(rename = "contentSessionId")]
    pub content_session_id: String,
    /// Working directory of the session.
    pub cwd: String,
    /// Originating tool name.
    pub tool_name: String,
    /// Originating tool input.
    pub tool_input: Value,
    /// Observation text.
    pub tool_response: String,
}

/// Client surface of the semantic-memory HTTP service.
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// `GET /api/health`, Ok on 200.
    async fn health(&self) -> Result<(), MemoryError>;

    /// `GET /api/search?query=…&limit=…[&project=…]`.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        project: Option<&str>,
    ) -> Result<SearchResponse, MemoryError>;

    /// `POST /api/sessions/observations`.
    async fn store_observation(&self, body: &ObservationBody) -> Result<(), MemoryError>;

    /// `GET /api/context/inject?project=…&colors=false`.
    async fn inject_context(&self, project: &str) -> Result<String, MemoryError>;
}

/// Production client over `reqwest`.
pub struct HttpMemoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMemoryClient {
    /// Builds a client against the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpMemoryClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl MemoryService for HttpMemoryClient {
    async fn health(&self) -> Result<(), MemoryError> {
        let response = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(MemoryError::Status {
                status: response.status().as_u16(),
            })
        }
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        project: Option<&str>,
    ) -> Result<SearchResponse, MemoryError> {
        let mut request = self
            .client
            .get(format!("{}/api/search", self.base_url))
            .query(&[("query", query), ("limit", &limit.to_string())]);
        if let Some(project) = project {
            request = request.query(&[("project", project)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MemoryError::Status {
                status: response.status().as_u16(),
            });
        }
        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| MemoryError::BadResponse(e.to_string()))
    }

    async fn store_observation(&self, body: &ObservationBody) -> Result<(), MemoryError> {
        let response = self
            .client
            .post(format!("{}/api/sessions/observations", self.base_url))
            .json(body)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(MemoryError::Status {
                status: response.status().as_u16(),
            })
        }
    }

    async fn inject_context(&self, project: &str) -> Result<String, MemoryError> {
        let response = self
            .client
            .get(format!("{}/api/context/inject", self.base_url))
            .query(&[("project", project), ("colors", "false")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MemoryError::Status {
                status: response.status().as_u16(),
            });
        }
        response
            .text()
            .await
            .map_err(|e| MemoryError::BadResponse(e.to_string()))
    }
}
