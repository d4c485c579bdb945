//! Collaborators the call pipeline depends on
//!
//! Concrete HTTP clients live in `aibridge-ai-services`; tests plug in
//! in-memory doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::CallSession;

/// Chat role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of conversation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Text produced by a response generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    /// Which backend answered
    pub provider: String,
}

/// Failure of an external service call
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Could not connect or the connection broke
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    #[error("Service timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status
    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response could not be understood
    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    /// Audio could not be produced or decoded
    #[error("Audio error: {0}")]
    Audio(String),

    /// Service is not configured
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl ServiceError {
    /// Connection-level failure (as opposed to a bad answer)
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ServiceError::Unreachable(_) | ServiceError::Timeout(_) | ServiceError::NotConfigured(_)
        ) || matches!(self, ServiceError::Status { status, .. } if *status >= 500)
    }
}

/// Speech to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe mono PCM. An empty string means nothing was understood.
    async fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<String, ServiceError>;
}

/// Conversation reply
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GeneratedReply, ServiceError>;

    fn name(&self) -> &str;
}

/// Text to speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns a WAV file
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes, ServiceError>;
}

/// Write-only persistence of call history
#[async_trait]
pub trait CallRecorder: Send + Sync {
    async fn call_started(&self, session: &CallSession) -> Result<(), ServiceError>;

    async fn call_answered(&self, session: &CallSession) -> Result<(), ServiceError>;

    /// One transcript and the reply spoken to it
    async fn exchange(
        &self,
        session: &CallSession,
        transcript: &str,
        reply: &str,
    ) -> Result<(), ServiceError>;

    async fn system_message(&self, session: &CallSession, text: &str) -> Result<(), ServiceError>;

    /// Notes dictated in recording mode
    async fn note_saved(
        &self,
        session: &CallSession,
        note: &str,
        saved_at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;

    async fn call_ended(&self, session: &CallSession) -> Result<(), ServiceError>;
}

/// Recorder that keeps nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

#[async_trait]
impl CallRecorder for NullRecorder {
    async fn call_started(&self, _session: &CallSession) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn call_answered(&self, _session: &CallSession) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn exchange(
        &self,
        _session: &CallSession,
        _transcript: &str,
        _reply: &str,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn system_message(&self, _session: &CallSession, _text: &str) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn note_saved(
        &self,
        _session: &CallSession,
        _note: &str,
        _saved_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn call_ended(&self, _session: &CallSession) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// The full set of collaborators a call needs
#[derive(Clone)]
pub struct Services {
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub recorder: Arc<dyn CallRecorder>,
}

impl Services {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn ResponseGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            transcriber,
            generator,
            synthesizer,
            recorder: Arc::new(NullRecorder),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn CallRecorder>) -> Self {
        self.recorder = recorder;
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("generator", &self.generator.name())
            .finish_non_exhaustive()
    }
}
