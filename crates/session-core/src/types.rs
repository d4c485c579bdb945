//! Call session types

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use aibridge_media_core::MuteGate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SIP Call-ID of an inbound call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Call lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Ringing,
    Answering,
    Active,
    Terminating,
    Ended,
}

impl CallState {
    /// Check if the call has finished
    pub fn is_final(&self) -> bool {
        matches!(self, CallState::Ended)
    }

    /// Check if the call is up (ACK received, not yet tearing down)
    pub fn is_active(&self) -> bool {
        matches!(self, CallState::Active)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "idle",
            CallState::Ringing => "ringing",
            CallState::Answering => "answering",
            CallState::Active => "active",
            CallState::Terminating => "terminating",
            CallState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Why a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Caller sent BYE
    RemoteHangup,
    /// Caller sent CANCEL before answering
    Cancelled,
    /// ACK never arrived
    AckTimeout,
    /// Maximum call duration reached
    MaxDuration,
    /// Nothing happened on the call for too long
    Inactivity,
    /// Gateway shutting down
    Shutdown,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EndReason::RemoteHangup => "remote hangup",
            EndReason::Cancelled => "cancelled",
            EndReason::AckTimeout => "ACK timeout",
            EndReason::MaxDuration => "maximum duration reached",
            EndReason::Inactivity => "inactivity",
            EndReason::Shutdown => "shutdown",
        };
        f.write_str(text)
    }
}

/// One inbound call
///
/// Owned by the call's actor task. Everything else refers to the call only
/// through its [`CallId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    pub call_id: CallId,
    /// Best-effort caller identity from the INVITE's From header
    pub caller: String,
    pub state: CallState,
    /// Where the caller wants RTP
    pub remote_media: Option<SocketAddr>,
    pub local_media_port: Option<u16>,
    /// Closed while we are speaking
    #[serde(skip)]
    pub mute: MuteGate,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
}

impl CallSession {
    pub fn new(call_id: CallId, caller: impl Into<String>) -> Self {
        Self {
            call_id,
            caller: caller.into(),
            state: CallState::Idle,
            remote_media: None,
            local_media_port: None,
            mute: MuteGate::muted(),
            created_at: Utc::now(),
            answered_at: None,
            ended_at: None,
            end_reason: None,
        }
    }

    /// Talk time: measured from the answer when there was one, else from
    /// the INVITE. `None` until the call has ended.
    pub fn duration(&self) -> Option<Duration> {
        let ended = self.ended_at?;
        let start = self.answered_at.unwrap_or(self.created_at);
        Some((ended - start).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn mark_answered(&mut self) {
        self.answered_at = Some(Utc::now());
    }

    pub fn mark_ended(&mut self, reason: EndReason) {
        self.ended_at = Some(Utc::now());
        self.end_reason.get_or_insert(reason);
    }
}
