// src/services/tts.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Turns reply text into MPEG audio. `Ok(None)` means speech is disabled.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>, TtsError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpeech;

#[async_trait]
impl SpeechSynthesizer for NoSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Option<Vec<u8>>, TtsError> {
        Ok(None)
    }
}

/// Remote text-to-speech service taking `{text, reference_id, format}`.
#[derive(Debug, Clone)]
pub struct HttpSpeech {
    client: reqwest::Client,
    url: String,
    api_key: String,
    reference_id: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    reference_id: &'a str,
    format: &'static str,
}

impl HttpSpeech {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        reference_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TtsError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            reference_id: reference_id.into(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeech {
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>, TtsError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let body = SpeechRequest {
            text,
            reference_id: &self.reference_id,
            format: "mp3",
        };
        let bytes = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tracing::debug!(len = bytes.len(), "speech synthesized");
        Ok(Some(bytes.to_vec()))
    }
}
