//! # Session-Core: inbound calls from INVITE to hangup
//!
//! This crate ties SIP signaling to the media engine and the AI pipeline:
//!
//! - [`signaling::SignalingEngine`] listens on the SIP socket, validates new
//!   INVITEs and routes in-dialog requests by Call-ID
//! - each call runs as its own actor task driven by the pure
//!   [`state::transition`] function
//! - [`orchestrator::CallOrchestrator`] turns the caller's utterances into
//!   spoken replies, one at a time
//! - [`services`] defines the speech, language model and persistence
//!   collaborators; [`events::EventBus`] broadcasts live updates
//!
//! ```rust,no_run
//! use aibridge_session_core::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(services: Services) -> aibridge_session_core::Result<()> {
//! let config = SessionConfig::default().with_extension("5000");
//! let events = EventBus::default();
//! let engine = SignalingEngine::bind(config, services, events.clone()).await?;
//!
//! let shutdown = CancellationToken::new();
//! engine.run(shutdown).await?;
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod commands;
pub mod config;
pub mod errors;
pub mod events;
pub mod orchestrator;
pub mod services;
pub mod signaling;
pub mod state;
pub mod transport;
pub mod types;
pub mod watchdog;

pub use errors::{Result, SessionError};

/// Commonly used types
pub mod prelude {
    pub use crate::call::CallRegistry;
    pub use crate::commands::{NoteTaker, VoiceCommand};
    pub use crate::config::{PipelineConfig, SessionConfig};
    pub use crate::errors::SessionError;
    pub use crate::events::{CallEvent, EventBus, EventHandler};
    pub use crate::orchestrator::{AbandonReason, CallOrchestrator, PipelineOutcome};
    pub use crate::services::{
        CallRecorder, ChatMessage, GeneratedReply, NullRecorder, ResponseGenerator, Role,
        ServiceError, Services, SpeechSynthesizer, Transcriber,
    };
    pub use crate::signaling::SignalingEngine;
    pub use crate::state::{Action, SignalingEvent, Transition, transition};
    pub use crate::types::{CallId, CallSession, CallState, EndReason};
}
