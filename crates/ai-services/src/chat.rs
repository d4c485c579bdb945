//! Chat model clients
//!
//! [`OllamaChat`] talks to a local Ollama server and is the primary
//! generator. [`OpenAiChat`] speaks the OpenAI chat completions dialect and
//! is used against Groq when the local model is unavailable.

use aibridge_session_core::services::{ChatMessage, GeneratedReply, ResponseGenerator, ServiceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::http::{HttpSettings, ensure_success, join_url};

pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sampling {
    pub temperature: f32,
    /// Replies are spoken, so they are kept short
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Ollama `/api/chat` client
pub struct OllamaChat {
    base_url: String,
    model: String,
    sampling: Sampling,
    settings: HttpSettings,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        settings: HttpSettings,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            sampling: Sampling::default(),
            client: settings.client()?,
            settings,
        })
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Whether the server answers at all
    pub async fn is_available(&self) -> bool {
        match self.client.get(&self.base_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %self.base_url, error = %e, "Ollama health check failed");
                false
            }
        }
    }
}

#[async_trait]
impl ResponseGenerator for OllamaChat {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GeneratedReply, ServiceError> {
        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.sampling.temperature,
                num_predict: self.sampling.max_tokens,
            },
        };
        debug!(model = %self.model, messages = messages.len(), "Sending chat to Ollama");

        let response = self
            .client
            .post(join_url(&self.base_url, "api/chat"))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.settings.request_error(e))?;
        let response = ensure_success("ollama", response).await?;
        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        let text = body
            .message
            .map(|m| m.content.trim().to_string())
            .unwrap_or_default();
        info!(model = %self.model, chars = text.len(), "Ollama replied");
        Ok(GeneratedReply {
            text,
            provider: self.name().to_string(),
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAiChat {
    url: String,
    api_key: Option<String>,
    model: String,
    provider: String,
    sampling: Sampling,
    settings: HttpSettings,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// `url` is the full completions endpoint
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
            provider: "groq".to_string(),
            sampling: Sampling::default(),
            client: settings.client()?,
            settings,
        })
    }

    /// Name reported in [`GeneratedReply::provider`]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider = name.into();
        self
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }
}

#[async_trait]
impl ResponseGenerator for OpenAiChat {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GeneratedReply, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::NotConfigured(format!("{} API key", self.provider)))?;
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.settings.request_error(e))?;
        let response = ensure_success(&self.provider, response).await?;
        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| ServiceError::InvalidResponse("no choices in completion".to_string()))?;
        info!(provider = %self.provider, model = %self.model, chars = text.len(), "Chat completion received");
        Ok(GeneratedReply {
            text,
            provider: self.provider.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.provider
    }
}
