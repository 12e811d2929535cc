//! Ollama text generation client and the duration prompts built on it

use std::time::Duration;

use aidea_common::human_time;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{http_client, read_json, send, TextGeneration, UpstreamError, UpstreamResult};
use crate::config::OllamaConfig;

const SERVICE: &str = "ollama";

/// Duration stored when the description names no time
pub const DEFAULT_DURATION: &str = "15m";

const DURATION_PROMPT: &str = r#"You are a time duration extractor. Your ONLY job is to output a time duration in the format below.

CRITICAL INSTRUCTIONS:
1. NEVER include any explanations, questions, or additional text in your response
2. ONLY output the final time duration and nothing else
3. DO NOT respond conversationally under any circumstances
4. Your ENTIRE response must be JUST the duration string

Format rules:
- ALWAYS OUTPUT EXACTLY "15m" if no specific time is mentioned in the input
- For specific time mentions, convert to the format "Xh Ym" where X is hours and Y is minutes
- For hours + minutes: 75 minutes = "1h 15m", 90 minutes = "1h 30m", 120 minutes = "2h"
- For minutes only (less than one hour): 30 minutes = "30m", 45 minutes = "45m"
- For exact hours: 2 hours = "2h", 1 hour = "1h"

Examples:
Input: "Working on project for 30 minutes"
Output: 30m

Input: "Spent 2 hours on bug fixes"
Output: 2h

Input: "Meeting lasted 1 hour and 15 minutes"
Output: 1h 15m

Input: "Coding the new feature"
Output: 15m"#;

const SECONDS_PROMPT: &str = r#"You are a time duration converter. Your ONLY job is to output a time duration in seconds.

CRITICAL INSTRUCTIONS:
1. NEVER include any explanations, questions, or additional text in your response
2. ONLY output the final time duration in seconds and nothing else
3. Your ENTIRE response must be JUST the duration integer in seconds

The input has the form "Xh Ym", "Xh" or "Ym" where X is hours and Y is minutes.

Examples:
Input: 30m
Output: 1800

Input: 1h
Output: 3600

Input: 2h 15m
Output: 8100"#;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for Ollama's `/api/generate`
pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig, timeout: Duration) -> UpstreamResult<Self> {
        Ok(Self {
            http: http_client(SERVICE, timeout)?,
            config,
        })
    }
}

#[async_trait]
impl TextGeneration for OllamaClient {
    async fn complete(&self, system: &str, prompt: &str) -> UpstreamResult<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            system,
            stream: false,
            max_tokens: 2000,
            temperature: 0.7,
        };

        let response = send(SERVICE, self.http.post(&self.config.endpoint).json(&request)).await?;
        let body: GenerateResponse = read_json(SERVICE, response).await?;
        debug!(model = %self.config.model, chars = body.response.len(), "Generation complete");
        Ok(body.response)
    }
}

/// Ask the model for the time spent described by `description`, as `Xh Ym`
///
/// The answer is trimmed; an empty answer becomes [`DEFAULT_DURATION`].
pub async fn extract_duration(
    generator: &dyn TextGeneration,
    description: &str,
) -> UpstreamResult<String> {
    let answer = generator.complete(DURATION_PROMPT, description).await?;
    let duration = answer.trim();
    if duration.is_empty() {
        warn!(description, "Model returned no duration, using default");
        return Ok(DEFAULT_DURATION.to_string());
    }
    Ok(duration.to_string())
}

/// Convert a stored duration phrase to seconds
///
/// The model's answer must be a bare integer. Anything else falls back to
/// parsing `duration` locally; if that fails too the answer is rejected.
pub async fn duration_seconds(generator: &dyn TextGeneration, duration: &str) -> UpstreamResult<i64> {
    let answer = generator.complete(SECONDS_PROMPT, duration).await?;

    if let Ok(seconds) = answer.trim().parse::<i64>() {
        if seconds > 0 {
            return Ok(seconds);
        }
    }

    match human_time::parse_duration_seconds(duration) {
        Some(seconds) => {
            warn!(duration, answer = answer.trim(), "Model answer not usable, parsed duration locally");
            Ok(seconds)
        }
        None => Err(UpstreamError::invalid(
            SERVICE,
            format!("cannot convert duration {duration:?} to seconds (model said {:?})", answer.trim()),
        )),
    }
}
