//! Whisper transcription over an OpenAI-compatible endpoint (Groq by default)

use aibridge_codec_core::encode_wav;
use aibridge_session_core::services::{ServiceError, Transcriber};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::http::{HttpSettings, ensure_success};

pub const GROQ_TRANSCRIPTION_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";

/// Uploads each utterance as a WAV file and returns the plain-text transcript
pub struct WhisperTranscriber {
    url: String,
    api_key: Option<String>,
    model: String,
    language: String,
    settings: HttpSettings,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    /// `url` is the full transcription endpoint
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        settings: HttpSettings,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            url: url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
            language: "en".to_string(),
            client: settings.client()?,
            settings,
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<String, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::NotConfigured("transcription API key".to_string()))?;
        if samples.is_empty() {
            return Ok(String::new());
        }

        let wav = encode_wav(samples, sample_rate).map_err(|e| ServiceError::Audio(e.to_string()))?;
        debug!(bytes = wav.len(), sample_rate, "Uploading utterance for transcription");

        let file = Part::bytes(wav.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "text")
            .text("language", self.language.clone());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.settings.request_error(e))?;
        let response = ensure_success("transcription", response).await?;

        let text = response
            .text()
            .await
            .map_err(|e| self.settings.request_error(e))?;
        let text = text.trim().to_string();
        info!(model = %self.model, chars = text.len(), "Utterance transcribed");
        Ok(text)
    }
}
