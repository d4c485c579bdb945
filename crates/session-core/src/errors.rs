//! Error types for session core
//!
//! Only listener startup surfaces these to callers. Per-call failures are
//! logged inside the call actor and end at most that call.

use thiserror::Error;

use crate::state::SignalingEvent;
use crate::types::CallState;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Event not valid in the current call state
    #[error("No transition from {state:?} on {event:?}")]
    InvalidTransition {
        state: CallState,
        event: SignalingEvent,
    },

    #[error("SIP error: {0}")]
    Sip(#[from] aibridge_sip_core::Error),

    /// Media engine could not be set up
    #[error("Media error: {0}")]
    Media(#[from] aibridge_media_core::Error),

    /// SIP socket error
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),
}
