//! Live-update events
//!
//! Fire-and-forget notifications for dashboards and logs. Nothing in the
//! call path depends on anyone listening.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::services::Role;
use crate::types::{CallId, EndReason};

/// State change or conversation event for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    Ringing {
        call_id: CallId,
        caller: String,
    },
    Connected {
        call_id: CallId,
        caller: String,
    },
    Ended {
        call_id: CallId,
        caller: String,
        duration_secs: f64,
        reason: EndReason,
    },
    /// No call in progress
    Idle,
    /// One side of the conversation
    Message {
        call_id: CallId,
        role: Role,
        text: String,
    },
    /// Raw transcript, before any filtering
    Transcription {
        call_id: CallId,
        text: String,
    },
    ServerStatus {
        status: String,
    },
}

/// Trait for event handlers
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle a call event
    async fn handle_event(&self, event: CallEvent);
}

/// Event bus for broadcasting call events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CallEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    /// Create a new event bus
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; dropped if nobody is listening
    pub fn publish(&self, event: CallEvent) {
        if self.sender.send(event).is_err() {
            debug!("Call event dropped, no subscribers");
        }
    }

    /// Feed every event to `handler` on a background task
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) -> tokio::task::JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handler.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!("Event handler lagged, {} events skipped", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
