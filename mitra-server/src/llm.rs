//! Generative replies via the Gemini `generateContent` API

use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Text used when the API answers without any candidate text
pub const EMPTY_REPLY: &str = "No response";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Gemini API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("LLM configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LlmError {
    /// Request URLs never reach logs or responses
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn reply(&self, prompt: &str) -> LlmResult<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    models: Vec<String>,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        if config.models.is_empty() {
            return Err(LlmError::Config("no models configured".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            models: config.models.clone(),
        })
    }

    async fn generate(&self, model: &str, prompt: &str) -> LlmResult<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let payload: Value = response.json().await.unwrap_or(Value::Null);
            let message = payload["error"]["message"]
                .as_str()
                .unwrap_or("Gemini API failed")
                .to_string();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.first_text().unwrap_or_else(|| EMPTY_REPLY.to_string()))
    }
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    /// Try each configured model in order; the last error is returned if all fail
    async fn reply(&self, prompt: &str) -> LlmResult<String> {
        let mut last_error = None;

        for model in &self.models {
            match self.generate(model, prompt).await {
                Ok(text) => {
                    tracing::debug!(model = %model, reply_len = text.len(), "Gemini reply received");
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Gemini model failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Config("no models configured".to_string())))
    }
}
