//! # AI-Services: the HTTP backends behind a call
//!
//! Concrete implementations of the `aibridge-session-core` service traits:
//!
//! - [`WhisperTranscriber`]: speech to text (Groq Whisper by default)
//! - [`OllamaChat`] and [`OpenAiChat`]: reply generation, combined by
//!   [`FailoverGenerator`] according to a [`FallbackPolicy`]
//! - [`EdgeTtsSynthesizer`]: text to speech as WAV
//!
//! Every client maps transport failures onto `ServiceError` so that the
//! call pipeline can tell an unreachable backend from a bad answer.

pub mod chat;
pub mod failover;
pub mod http;
pub mod tts;
pub mod whisper;

pub use chat::{GROQ_CHAT_URL, OllamaChat, OpenAiChat, Sampling};
pub use failover::{FailoverGenerator, FallbackPolicy, UnknownPolicy};
pub use http::HttpSettings;
pub use tts::EdgeTtsSynthesizer;
pub use whisper::{GROQ_TRANSCRIPTION_URL, WhisperTranscriber};
