//! External collaborators
//!
//! The tracker depends on three remote services: a vector index holding
//! categorization rules (Weaviate), a text generation model (Ollama) and the
//! Jira/Tempo worklog endpoint. Each is consumed through a narrow trait so the
//! service layer can be exercised against in-process fakes.

pub mod ollama;
pub mod tempo_client;
pub mod weaviate;

pub use ollama::OllamaClient;
pub use tempo_client::HttpTempoPoster;
pub use weaviate::WeaviateClient;

use std::time::Duration;

use aidea_common::Rule;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::categorizer::RuleMatch;
use crate::tempo::TempoPayload;

/// Remote call failures
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection refused, DNS failure or timeout
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    /// Service answered with a non-success status
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Service answered but the body was not what we expected
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl UpstreamError {
    pub fn invalid(service: &'static str, message: impl Into<String>) -> Self {
        UpstreamError::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, UpstreamError::Unavailable { .. })
    }

    fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return UpstreamError::invalid(service, err.to_string());
        }
        // Timeouts, refused connections and anything else on the wire
        UpstreamError::Unavailable {
            service,
            message: err.to_string(),
        }
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Nearest-neighbor search over categorization rules
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Up to `limit` rules closest to `query`, closest first
    async fn nearest_neighbors(&self, query: &str, limit: usize) -> UpstreamResult<Vec<RuleMatch>>;
}

/// Write access to the rule collection
#[async_trait]
pub trait RuleIndex: Send + Sync {
    /// Create the rule collection if it does not exist
    ///
    /// Returns true if the collection was created by this call.
    async fn ensure_collection(&self) -> UpstreamResult<bool>;

    /// Create `rule`, or merge it into the existing object with the same id
    async fn upsert_rule(&self, rule: &Rule) -> UpstreamResult<()>;
}

/// Single-shot text completion
#[async_trait]
pub trait TextGeneration: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> UpstreamResult<String>;
}

/// Worklog submission
#[async_trait]
pub trait TempoPoster: Send + Sync {
    /// Post one worklog, returning the endpoint's response body
    async fn post(&self, payload: &TempoPayload) -> UpstreamResult<serde_json::Value>;
}

/// HTTP client with a request-wide timeout
pub(crate) fn http_client(service: &'static str, timeout: Duration) -> UpstreamResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("aidea-tracker/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| UpstreamError::from_reqwest(service, e))
}

/// Send `request` and return the response if its status is a success
pub(crate) async fn send(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> UpstreamResult<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|e| UpstreamError::from_reqwest(service, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            service,
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Read a success response body as JSON
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> UpstreamResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| UpstreamError::from_reqwest(service, e))?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::invalid(service, e.to_string()))
}
