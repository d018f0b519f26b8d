//! Story generation through Gemini's `generateContent` endpoint.
//!
//! Failures never propagate past [`write_story`]: they come back as
//! [`StoryOutcome::Failed`] with a user-facing message.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GeminiConfig;

/// Prefix of every user-visible generation failure.
pub const STORY_ERROR_MARKER: &str = "Story generation error: ";

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("API error: {0}")]
    Api(String),
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("empty response (finish reason: {0})")]
    Empty(String),
}

/// Result of one generate action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryOutcome {
    Ready(String),
    /// Message already carries [`STORY_ERROR_MARKER`].
    Failed(String),
}

#[async_trait]
pub trait StoryWriter: Send + Sync {
    async fn write(&self, prompt: &str) -> Result<String, WriterError>;
}

/// Run the writer and fold any error into a marker-prefixed failure.
pub async fn write_story(writer: &dyn StoryWriter, prompt: &str) -> StoryOutcome {
    let t_start = Instant::now();
    match writer.write(prompt).await {
        Ok(text) => {
            info!(
                "Story generated: {} chars in {:.0}ms",
                text.len(),
                t_start.elapsed().as_secs_f64() * 1000.0
            );
            StoryOutcome::Ready(text)
        }
        Err(e) => {
            warn!("Story generation failed: {e}");
            StoryOutcome::Failed(format!("{STORY_ERROR_MARKER}{e}"))
        }
    }
}

pub struct GeminiWriter {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiWriter {
    pub fn new(api_key: &str, config: &GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiApiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiApiError {
    message: String,
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GeminiResponse) -> Result<String, WriterError> {
    if let Some(err) = response.error {
        return Err(WriterError::Api(err.message));
    }

    let candidate = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| WriterError::Empty("NO_CANDIDATES".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".into());
        return Err(WriterError::Empty(reason));
    }
    Ok(text)
}

#[async_trait]
impl StoryWriter for GeminiWriter {
    async fn write(&self, prompt: &str) -> Result<String, WriterError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!("Sending prompt to Gemini model '{}' ({} chars)", self.model, prompt.len());

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            // Gemini wraps most failures in {"error": {...}}
            if let Ok(parsed) = serde_json::from_str::<GeminiResponse>(&text) {
                if let Some(err) = parsed.error {
                    return Err(WriterError::Api(err.message));
                }
            }
            return Err(WriterError::Status { status, body: text });
        }

        extract_text(serde_json::from_str(&text)?)
    }
}
