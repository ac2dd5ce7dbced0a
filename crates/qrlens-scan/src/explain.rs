//! AI explanation of decoded payloads.
//!
//! A single async call per request, no retries and no cancellation. Every
//! failure settles to a fallback string so the caller never stays pending.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Shown when the service answers with no text.
pub const EMPTY_FALLBACK: &str = "Analysis complete, no additional remarks.";
/// Shown when the call fails.
pub const ERROR_FALLBACK: &str =
    "Could not complete the AI analysis right now. Please check the content manually.";

const SYSTEM_INSTRUCTION: &str = "You are a digital security expert. Your job is to analyze \
QR code data and explain what it represents, warning about possible phishing risks in \
unknown links or explaining the data format (e.g. vCard, JSON, plain text).";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Explanation failure.
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("No API key configured (set one of: {0})")]
    MissingApiKey(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<ExplainError> for qrlens_core::ScanError {
    fn from(e: ExplainError) -> Self {
        qrlens_core::ScanError::AiServiceFailure(e.to_string())
    }
}

/// Something that can explain a payload in a sentence or two.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, content: &str) -> Result<String, ExplainError>;
}

/// Prompt sent for `content`.
pub fn build_prompt(content: &str) -> String {
    format!(
        "Analyze the following QR code content and tell me what it is, very concisely \
         (2 sentences at most). If it is a link, check whether it looks malicious or \
         official. Content: \"{content}\""
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl Content {
    fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

impl GenerateResponse {
    /// Concatenated text of the first candidate, if any.
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiSummarizer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        }
    }

    /// Build from the first API key found in `key_vars`.
    pub fn from_env(
        key_vars: &[String],
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, ExplainError> {
        let key = key_vars
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| ExplainError::MissingApiKey(key_vars.join(", ")))?;
        Ok(Self::new(key, model, temperature))
    }

    fn request_body(&self, content: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content::text(build_prompt(content))],
            system_instruction: Content::text(SYSTEM_INSTRUCTION),
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", API_BASE, self.model)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, content: &str) -> Result<String, ExplainError> {
        tracing::debug!("Requesting explanation from {}", self.model);
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(content))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExplainError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        tracing::debug!("Explanation received in {:?}", start.elapsed());
        Ok(parsed.text().unwrap_or_default())
    }
}

/// Turn a service result into display text.
pub fn settle(result: Result<String, ExplainError>) -> String {
    match result {
        Ok(text) if text.trim().is_empty() => EMPTY_FALLBACK.to_string(),
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::warn!("Explanation failed: {}", e);
            ERROR_FALLBACK.to_string()
        }
    }
}

/// Explanation state for the active result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExplanationState {
    #[default]
    Idle,
    Pending,
    Settled(String),
}

/// Runs explanations and tracks their state.
pub struct Explainer<S: Summarizer> {
    summarizer: S,
    state: ExplanationState,
}

impl<S: Summarizer> Explainer<S> {
    pub fn new(summarizer: S) -> Self {
        Self {
            summarizer,
            state: ExplanationState::Idle,
        }
    }

    pub fn state(&self) -> &ExplanationState {
        &self.state
    }

    /// Explain `content`. Always ends settled.
    pub async fn explain(&mut self, content: &str) -> &str {
        self.state = ExplanationState::Pending;
        let text = settle(self.summarizer.summarize(content).await);
        self.state = ExplanationState::Settled(text);
        match &self.state {
            ExplanationState::Settled(text) => text,
            _ => ERROR_FALLBACK,
        }
    }

    /// Forget the last explanation, e.g. when the result is dismissed.
    pub fn reset(&mut self) {
        self.state = ExplanationState::Idle;
    }
}
