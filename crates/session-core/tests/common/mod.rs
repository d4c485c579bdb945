//! In-memory collaborators for pipeline and signaling tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use aibridge_codec_core::encode_wav;
use aibridge_session_core::prelude::*;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Transcriber answering from a script, tracking how many calls overlap
#[derive(Default)]
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Length of every input, in call order
    pub inputs: Mutex<Vec<usize>>,
}

impl ScriptedTranscriber {
    pub fn new<I, S>(script: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(script.into_iter().map(Into::into).collect()),
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().len()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, samples: &[i16], _sample_rate: u32) -> Result<String, ServiceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.inputs.lock().push(samples.len());
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.script.lock().pop_front().unwrap_or_default())
    }
}

/// Generator that echoes the last user message
#[derive(Default)]
pub struct EchoGenerator {
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl EchoGenerator {
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GeneratedReply, ServiceError> {
        self.requests.lock().push(messages.to_vec());
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(GeneratedReply {
            text: format!("You said {last}"),
            provider: "echo".to_string(),
        })
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Synthesizer returning a short 16 kHz tone as WAV
#[derive(Default)]
pub struct ToneSynthesizer {
    pub texts: Mutex<Vec<String>>,
}

impl ToneSynthesizer {
    pub fn calls(&self) -> usize {
        self.texts.lock().len()
    }
}

#[async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Bytes, ServiceError> {
        self.texts.lock().push(text.to_string());
        // 100ms at 16 kHz, five RTP frames once resampled
        let samples: Vec<i16> = (0..1600)
            .map(|i| if i % 8 < 4 { 4000 } else { -4000 })
            .collect();
        encode_wav(&samples, 16000).map_err(|e| ServiceError::Audio(e.to_string()))
    }
}

/// Recorder keeping a log of what it was told
#[derive(Default)]
pub struct MemoryRecorder {
    pub entries: Mutex<Vec<String>>,
    pub notes: Mutex<Vec<String>>,
}

impl MemoryRecorder {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl CallRecorder for MemoryRecorder {
    async fn call_started(&self, session: &CallSession) -> Result<(), ServiceError> {
        self.entries.lock().push(format!("started {}", session.caller));
        Ok(())
    }

    async fn call_answered(&self, session: &CallSession) -> Result<(), ServiceError> {
        self.entries.lock().push(format!("answered {}", session.call_id));
        Ok(())
    }

    async fn exchange(
        &self,
        _session: &CallSession,
        transcript: &str,
        reply: &str,
    ) -> Result<(), ServiceError> {
        self.entries.lock().push(format!("exchange {transcript} / {reply}"));
        Ok(())
    }

    async fn system_message(&self, _session: &CallSession, text: &str) -> Result<(), ServiceError> {
        self.entries.lock().push(format!("system {text}"));
        Ok(())
    }

    async fn note_saved(
        &self,
        _session: &CallSession,
        note: &str,
        _saved_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.notes.lock().push(note.to_string());
        Ok(())
    }

    async fn call_ended(&self, session: &CallSession) -> Result<(), ServiceError> {
        self.entries
            .lock()
            .push(format!("ended {:?}", session.end_reason));
        Ok(())
    }
}

pub struct Mocks {
    pub transcriber: Arc<ScriptedTranscriber>,
    pub generator: Arc<EchoGenerator>,
    pub synthesizer: Arc<ToneSynthesizer>,
    pub recorder: Arc<MemoryRecorder>,
}

impl Mocks {
    pub fn new(transcriber: ScriptedTranscriber) -> Self {
        Self {
            transcriber: Arc::new(transcriber),
            generator: Arc::new(EchoGenerator::default()),
            synthesizer: Arc::new(ToneSynthesizer::default()),
            recorder: Arc::new(MemoryRecorder::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services::new(
            self.transcriber.clone(),
            self.generator.clone(),
            self.synthesizer.clone(),
        )
        .with_recorder(self.recorder.clone())
    }
}

/// Loud square wave at 8 kHz
pub fn speech(samples: usize) -> Vec<i16> {
    (0..samples)
        .map(|i| if i % 2 == 0 { 3000 } else { -3000 })
        .collect()
}
