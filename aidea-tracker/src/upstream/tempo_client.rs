//! Jira/Tempo worklog endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{http_client, send, TempoPoster, UpstreamError, UpstreamResult};
use crate::tempo::TempoPayload;

const SERVICE: &str = "tempo";

/// POSTs worklogs as JSON to a configured URL
pub struct HttpTempoPoster {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpTempoPoster {
    /// Poster for `endpoint`; with `None` every post fails as unavailable
    pub fn new(endpoint: Option<String>, timeout: Duration) -> UpstreamResult<Self> {
        Ok(Self {
            http: http_client(SERVICE, timeout)?,
            endpoint,
        })
    }
}

#[async_trait]
impl TempoPoster for HttpTempoPoster {
    async fn post(&self, payload: &TempoPayload) -> UpstreamResult<Value> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Err(UpstreamError::Unavailable {
                service: SERVICE,
                message: "JIRA_TEMPO_ENDPOINT is not configured".to_string(),
            });
        };

        let response = send(SERVICE, self.http.post(endpoint).json(payload)).await?;
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::invalid(SERVICE, e.to_string()))?;

        info!(
            issue = %payload.issue_key,
            seconds = payload.time_spent_seconds,
            "Worklog posted"
        );

        // Endpoints differ in what they answer; keep non-JSON bodies as text
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
