//! Spoken narration through OpenAI's `/audio/speech` endpoint.

use std::io::Cursor;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SpeechConfig;
use crate::story::Voice;

/// Prefix of every user-visible synthesis failure.
pub const AUDIO_ERROR_MARKER: &str = "Audio error: ";

pub const AUDIO_MIME: &str = "audio/mpeg";

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("API returned no audio")]
    Empty,
}

/// MP3 bytes returned by one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    bytes: Vec<u8>,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Seekable reader over the clip.
    pub fn stream(&self) -> Cursor<&[u8]> {
        Cursor::new(self.bytes.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutcome {
    /// No speech credential configured; audio is switched off, not broken.
    Unavailable,
    Ready(AudioClip),
    /// Message already carries [`AUDIO_ERROR_MARKER`].
    Failed(String),
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, SpeechError>;
}

/// Narrate `text`, turning a missing client or any error into an outcome.
pub async fn narrate(
    synthesizer: Option<&dyn SpeechSynthesizer>,
    text: &str,
    voice: Voice,
) -> AudioOutcome {
    let Some(synthesizer) = synthesizer else {
        return AudioOutcome::Unavailable;
    };

    let t_start = Instant::now();
    match synthesizer.synthesize(text, voice).await {
        Ok(bytes) if bytes.is_empty() => {
            warn!("Speech synthesis returned no audio");
            AudioOutcome::Failed(format!("{AUDIO_ERROR_MARKER}{}", SpeechError::Empty))
        }
        Ok(bytes) => {
            info!(
                "Narration ready: {} bytes, voice={} ({:.0}ms)",
                bytes.len(),
                voice.id(),
                t_start.elapsed().as_secs_f64() * 1000.0
            );
            AudioOutcome::Ready(AudioClip::new(bytes))
        }
        Err(e) => {
            warn!("Speech synthesis failed: {e}");
            AudioOutcome::Failed(format!("{AUDIO_ERROR_MARKER}{e}"))
        }
    }
}

pub struct OpenAiSpeech {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl OpenAiSpeech {
    pub fn new(api_key: &str, config: &SpeechConfig) -> Self {
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

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, SpeechError> {
        let url = format!("{}/audio/speech", self.base_url);

        let body = json!({
            "model": self.model,
            "voice": voice.id(),
            "input": text,
            "response_format": "mp3",
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SpeechError::Status { status, body });
        }

        Ok(resp.bytes().await?.to_vec())
    }
}
