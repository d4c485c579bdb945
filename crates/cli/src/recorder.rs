//! Call history appended to a JSON lines file

use std::path::{Path, PathBuf};

use aibridge_session_core::prelude::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Entry<'a> {
    CallStarted {
        caller: &'a str,
    },
    CallAnswered {
        caller: &'a str,
    },
    Exchange {
        transcript: &'a str,
        reply: &'a str,
    },
    System {
        text: &'a str,
    },
    Note {
        note: &'a str,
    },
    CallEnded {
        caller: &'a str,
        duration_secs: Option<f64>,
        reason: Option<EndReason>,
    },
}

#[derive(Debug, Serialize)]
struct Line<'a> {
    at: DateTime<Utc>,
    call_id: &'a CallId,
    #[serde(flatten)]
    entry: Entry<'a>,
}

/// [`CallRecorder`] writing one JSON object per line
pub struct JsonlCallRecorder {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlCallRecorder {
    /// Open `path` for appending, creating it and its directory if needed
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, call_id: &CallId, at: DateTime<Utc>, entry: Entry<'_>) -> Result<(), ServiceError> {
        let line = Line { at, call_id, entry };
        let mut bytes =
            serde_json::to_vec(&line).map_err(|e| ServiceError::Persistence(e.to_string()))?;
        bytes.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&bytes)
            .await
            .map_err(|e| ServiceError::Persistence(format!("{}: {e}", self.path.display())))?;
        file.flush()
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;
        debug!(call_id = %call_id, bytes = bytes.len(), "Recorded call event");
        Ok(())
    }
}

#[async_trait]
impl CallRecorder for JsonlCallRecorder {
    async fn call_started(&self, session: &CallSession) -> Result<(), ServiceError> {
        let entry = Entry::CallStarted {
            caller: &session.caller,
        };
        self.write(&session.call_id, session.created_at, entry).await
    }

    async fn call_answered(&self, session: &CallSession) -> Result<(), ServiceError> {
        let at = session.answered_at.unwrap_or_else(Utc::now);
        let entry = Entry::CallAnswered {
            caller: &session.caller,
        };
        self.write(&session.call_id, at, entry).await
    }

    async fn exchange(
        &self,
        session: &CallSession,
        transcript: &str,
        reply: &str,
    ) -> Result<(), ServiceError> {
        self.write(&session.call_id, Utc::now(), Entry::Exchange { transcript, reply })
            .await
    }

    async fn system_message(&self, session: &CallSession, text: &str) -> Result<(), ServiceError> {
        self.write(&session.call_id, Utc::now(), Entry::System { text })
            .await
    }

    async fn note_saved(
        &self,
        session: &CallSession,
        note: &str,
        saved_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.write(&session.call_id, saved_at, Entry::Note { note }).await
    }

    async fn call_ended(&self, session: &CallSession) -> Result<(), ServiceError> {
        let at = session.ended_at.unwrap_or_else(Utc::now);
        let entry = Entry::CallEnded {
            caller: &session.caller,
            duration_secs: session.duration().map(|d| d.as_secs_f64()),
            reason: session.end_reason,
        };
        self.write(&session.call_id, at, entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn lines(path: &Path) -> Vec<Value> {
        tokio::fs::read_to_string(path)
            .await
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_call_history_is_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history").join("calls.jsonl");
        let recorder = JsonlCallRecorder::open(&path).await.unwrap();

        let mut session = CallSession::new(CallId::from("abc@host"), "Jane Doe");
        recorder.call_started(&session).await.unwrap();
        session.mark_answered();
        recorder.call_answered(&session).await.unwrap();
        recorder
            .exchange(&session, "What time is it?", "It is noon.")
            .await
            .unwrap();
        recorder
            .note_saved(&session, "[12:00:00] Buy milk", Utc::now())
            .await
            .unwrap();
        session.mark_ended(EndReason::RemoteHangup);
        recorder.call_ended(&session).await.unwrap();

        let entries = lines(&path).await;
        let kinds: Vec<&str> = entries.iter().map(|e| e["event"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            vec!["call_started", "call_answered", "exchange", "note", "call_ended"]
        );
        assert!(entries.iter().all(|e| e["call_id"] == "abc@host"));
        assert_eq!(entries[2]["transcript"], "What time is it?");
        assert_eq!(entries[2]["reply"], "It is noon.");
        assert_eq!(entries[4]["reason"], "remote_hangup");
        assert!(entries[4]["duration_secs"].as_f64().is_some());
    }

    #[tokio::test]
    async fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.jsonl");
        let session = CallSession::new(CallId::from("c1"), "Unknown");

        for _ in 0..2 {
            let recorder = JsonlCallRecorder::open(&path).await.unwrap();
            recorder.system_message(&session, "Hello!").await.unwrap();
        }
        assert_eq!(lines(&path).await.len(), 2);
    }
}
