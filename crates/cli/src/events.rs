use aibridge_session_core::prelude::*;
use async_trait::async_trait;
use tracing::info;

/// Writes every live event to the log
pub struct LogEvents;

#[async_trait]
impl EventHandler for LogEvents {
    async fn handle_event(&self, event: CallEvent) {
        match event {
            CallEvent::Ringing { call_id, caller } => {
                info!(call_id = %call_id, caller = %caller, "📞 Incoming call");
            }
            CallEvent::Connected { call_id, caller } => {
                info!(call_id = %call_id, caller = %caller, "✅ Call connected");
            }
            CallEvent::Ended {
                call_id,
                caller,
                duration_secs,
                reason,
            } => {
                info!(
                    call_id = %call_id,
                    caller = %caller,
                    duration_secs = format_args!("{duration_secs:.1}"),
                    reason = %reason,
                    "📴 Call ended"
                );
            }
            CallEvent::Idle => info!("Waiting for calls"),
            CallEvent::Message { call_id, role, text } => {
                info!(call_id = %call_id, role = ?role, "💬 {}", text);
            }
            CallEvent::Transcription { call_id, text } => {
                info!(call_id = %call_id, "🎤 Heard: {}", text);
            }
            CallEvent::ServerStatus { status } => info!("Server {}", status),
        }
    }
}
