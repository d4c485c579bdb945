//! Speech synthesis through an openai-edge-tts server

use aibridge_session_core::services::{ServiceError, SpeechSynthesizer};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info};

use crate::http::{HttpSettings, ensure_success, join_url};

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// OpenAI-compatible `/v1/audio/speech` client asking for WAV output
pub struct EdgeTtsSynthesizer {
    base_url: String,
    api_key: Option<String>,
    model: String,
    settings: HttpSettings,
    client: reqwest::Client,
}

impl EdgeTtsSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        settings: HttpSettings,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: "tts-1".to_string(),
            client: settings.client()?,
            settings,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTtsSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::Audio("nothing to synthesize".to_string()));
        }
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: "wav",
        };
        debug!(voice, chars = text.len(), "Requesting speech");

        let mut builder = self
            .client
            .post(join_url(&self.base_url, "v1/audio/speech"))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| self.settings.request_error(e))?;
        let response = ensure_success("tts", response).await?;
        let audio = response
            .bytes()
            .await
            .map_err(|e| self.settings.request_error(e))?;

        if !audio.starts_with(b"RIFF") {
            return Err(ServiceError::InvalidResponse(format!(
                "expected WAV audio, got {} bytes of something else",
                audio.len()
            )));
        }
        info!(voice, bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }
}
