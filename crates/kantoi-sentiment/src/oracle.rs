//! Text-generation oracle used for classification and brief prose.
//!
//! [`TextOracle`] is the seam the pipeline depends on; [`GeminiClient`] is
//! the production implementation on top of the Gemini `generateContent`
//! REST endpoint.

use std::future::Future;
use std::time::Duration;

use kantoi_core::{AppConfig, Archetype, Topic};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::SentimentError;
use crate::retry::retry_with_backoff;

/// Sampling temperature for classification replies.
pub const CLASSIFY_TEMPERATURE: f32 = 0.2;
/// Sampling temperature for brief prose.
pub const BRIEF_TEMPERATURE: f32 = 0.45;

/// Anything that turns a prompt into text.
pub trait TextOracle: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> impl Future<Output = Result<String, SentimentError>> + Send;
}

/// Render the classification prompt for one caption.
#[must_use]
pub fn classification_prompt(caption: &str) -> String {
    let archetypes: Vec<&str> = Archetype::ALL.iter().map(|a| a.as_str()).collect();
    let topics: Vec<&str> = Topic::ALL
        .iter()
        .filter(|t| **t != Topic::Uncategorized)
        .map(|t| t.as_str())
        .collect();
    format!(
        "Classify this Malaysian social media caption.\n\
         \n\
         CAPTION:\n{caption}\n\
         \n\
         Reply with one JSON object:\n\
         - \"sentiment\": -1, 0 or 1 toward the government\n\
         - \"archetype\": exactly one of {archetypes:?}\n\
         - \"topic\": exactly one of {topics:?}\n\
         - \"specific_trigger\": the concrete issue in at most 4 words\n\
         - \"is_identity_risk\": true if it touches race, religion or royalty\n\
         - \"is_sarcasm\": true if the literal wording means the opposite\n\
         - \"summary\": one neutral sentence\n"
    )
}

/// Connection settings for [`GeminiClient`].
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

impl GeminiConfig {
    /// `None` when no API key is configured.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Option<Self> {
        config.oracle_api_key.as_ref().map(|key| Self {
            api_key: key.clone(),
            base_url: config.oracle_base_url.clone(),
            model: config.oracle_model.clone(),
            timeout_secs: config.oracle_request_timeout_secs,
            max_retries: config.oracle_max_retries,
            backoff_base_ms: config.oracle_retry_backoff_base_ms,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
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
    #[serde(default)]
    text: String,
}

/// HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns [`SentimentError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &GeminiConfig) -> Result<Self, SentimentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("kantoi/0.1 (trust-monitor)")
            .build()?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint,
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
        })
    }

    async fn generate_once(&self, prompt: &str, temperature: f32) -> Result<String, SentimentError> {
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SentimentError::Oracle {
                status: status.as_u16(),
                message: body.chars().take(300).collect(),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(SentimentError::EmptyReply);
        }
        Ok(text)
    }
}

impl TextOracle for GeminiClient {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, SentimentError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.generate_once(prompt, temperature)
        })
        .await
    }
}
