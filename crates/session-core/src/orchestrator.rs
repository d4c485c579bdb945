//! Conversation pipeline for one call
//!
//! The orchestrator consumes utterances from the media engine strictly in
//! order, one at a time: transcribe, generate a reply, synthesize it and
//! play it back with the caller muted. Utterances that arrive while a
//! reply is being produced wait in the channel. A failing step abandons
//! the utterance and the call carries on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use aibridge_codec_core::{NARROWBAND_RATE, WIDEBAND_RATE, decode_wav, normalize, resample, rms};
use aibridge_media_core::{MediaEngine, Utterance};
use chrono::{Local, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{NoteTaker, VoiceCommand};
use crate::config::PipelineConfig;
use crate::events::{CallEvent, EventBus};
use crate::services::{ChatMessage, Role, ServiceError, Services};
use crate::types::CallSession;

/// Why an utterance produced no reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// Average energy below the configured floor
    TooQuiet,
    TranscriptionFailed,
    EmptyTranscript,
    /// Known noise transcript such as "thank you."
    Hallucination,
    GenerationFailed,
    EmptyReply,
    SynthesisFailed,
    PlaybackFailed,
}

/// What handling one utterance amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Replied { transcript: String, reply: String },
    Abandoned(AbandonReason),
    RecordingStarted,
    /// Transcript appended to the note being dictated
    NoteTaken,
    /// Recording stopped; carries the saved note, if anything was dictated
    NoteSaved(Option<String>),
}

/// Runs the AI conversation for one call
pub struct CallOrchestrator {
    session: CallSession,
    engine: Arc<MediaEngine>,
    services: Services,
    config: PipelineConfig,
    events: EventBus,
    history: Vec<ChatMessage>,
    notes: NoteTaker,
}

impl CallOrchestrator {
    pub fn new(
        session: CallSession,
        engine: Arc<MediaEngine>,
        services: Services,
        config: PipelineConfig,
        events: EventBus,
    ) -> Self {
        Self {
            session,
            engine,
            services,
            config,
            events,
            history: Vec::new(),
            notes: NoteTaker::default(),
        }
    }

    /// Conversation so far, oldest first
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn is_recording(&self) -> bool {
        self.notes.is_active()
    }

    /// Play the welcome prompt, then handle utterances until the channel
    /// closes or `cancel` fires.
    pub async fn run(
        mut self,
        mut utterances: mpsc::UnboundedReceiver<Utterance>,
        cancel: CancellationToken,
    ) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = self.welcome() => {}
        }
        self.engine.gate().unmute_and_recalibrate();

        loop {
            let utterance = tokio::select! {
                _ = cancel.cancelled() => break,
                next = utterances.recv() => match next {
                    Some(utterance) => utterance,
                    None => break,
                },
            };
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.handle_utterance(utterance) => outcome,
            };
            debug!(call_id = %self.session.call_id, ?outcome, "Utterance handled");
        }

        self.finish().await;
    }

    /// Speak the welcome prompt with the caller muted
    pub async fn welcome(&mut self) {
        let text = self.config.welcome_text.trim().to_string();
        if text.is_empty() {
            return;
        }
        match self.speak(&text).await {
            Ok(()) => {
                self.history.push(ChatMessage::assistant(text.clone()));
                self.publish_message(Role::Assistant, &text);
                if let Err(e) = self.services.recorder.system_message(&self.session, &text).await {
                    warn!(call_id = %self.session.call_id, "Failed to record welcome: {}", e);
                }
            }
            Err(e) => warn!(call_id = %self.session.call_id, "Welcome prompt not played: {}", e),
        }
    }

    /// Take one utterance through the pipeline
    pub async fn handle_utterance(&mut self, utterance: Utterance) -> PipelineOutcome {
        let call_id = self.session.call_id.clone();
        let mut samples = utterance.samples;

        let energy = rms(&samples);
        if energy < self.config.min_energy {
            debug!(call_id = %call_id, energy, "Utterance too quiet, skipped");
            return PipelineOutcome::Abandoned(AbandonReason::TooQuiet);
        }
        normalize(&mut samples, self.config.normalize_peak);
        let wideband = resample(&samples, utterance.sample_rate, WIDEBAND_RATE);

        let transcript = match timed(
            self.config.transcribe_timeout,
            self.services.transcriber.transcribe(&wideband, WIDEBAND_RATE),
        )
        .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(call_id = %call_id, "Transcription failed: {}", e);
                return PipelineOutcome::Abandoned(AbandonReason::TranscriptionFailed);
            }
        };
        if transcript.is_empty() {
            debug!(call_id = %call_id, "Empty transcript");
            return PipelineOutcome::Abandoned(AbandonReason::EmptyTranscript);
        }
        self.events.publish(CallEvent::Transcription {
            call_id: call_id.clone(),
            text: transcript.clone(),
        });
        if self.config.is_hallucination(&transcript) {
            debug!(call_id = %call_id, transcript = %transcript, "Ignoring likely hallucination");
            return PipelineOutcome::Abandoned(AbandonReason::Hallucination);
        }
        info!(call_id = %call_id, "Caller said: {}", transcript);

        if let Some(outcome) = self.handle_recording_mode(&transcript).await {
            return outcome;
        }

        self.publish_message(Role::User, &transcript);
        let mut tone = self.engine.start_thinking_tone();

        let reply = match timed(
            self.config.generate_timeout,
            self.services.generator.generate(&self.prompt(&transcript)),
        )
        .await
        {
            Ok(reply) => {
                debug!(call_id = %call_id, provider = %reply.provider, "Reply generated");
                reply.text.trim().to_string()
            }
            Err(e) => {
                warn!(call_id = %call_id, "Response generation failed: {}", e);
                return PipelineOutcome::Abandoned(AbandonReason::GenerationFailed);
            }
        };
        if reply.is_empty() {
            return PipelineOutcome::Abandoned(AbandonReason::EmptyReply);
        }

        let audio = match self.synthesize(&reply).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(call_id = %call_id, "Speech synthesis failed: {}", e);
                return PipelineOutcome::Abandoned(AbandonReason::SynthesisFailed);
            }
        };

        if let Some(tone) = tone.take() {
            tone.stop().await;
        }
        info!(call_id = %call_id, "Replying: {}", reply);
        self.publish_message(Role::Assistant, &reply);
        if let Err(e) = self.engine.play_muted(&audio).await {
            warn!(call_id = %call_id, "Playback failed: {}", e);
            return PipelineOutcome::Abandoned(AbandonReason::PlaybackFailed);
        }

        self.history.push(ChatMessage::user(transcript.clone()));
        self.history.push(ChatMessage::assistant(reply.clone()));
        if let Err(e) = self
            .services
            .recorder
            .exchange(&self.session, &transcript, &reply)
            .await
        {
            warn!(call_id = %call_id, "Failed to record exchange: {}", e);
        }

        PipelineOutcome::Replied { transcript, reply }
    }

    /// Save a note still being dictated when the call ends
    pub async fn finish(&mut self) {
        if self.notes.is_active() {
            let note = self.notes.finish();
            self.save_note(note).await;
        }
    }

    async fn handle_recording_mode(&mut self, transcript: &str) -> Option<PipelineOutcome> {
        match VoiceCommand::parse(transcript) {
            Some(VoiceCommand::StartRecording) if !self.notes.is_active() => {
                info!(call_id = %self.session.call_id, "Recording mode on");
                self.notes.start();
                Some(PipelineOutcome::RecordingStarted)
            }
            Some(VoiceCommand::StopRecording) if self.notes.is_active() => {
                info!(call_id = %self.session.call_id, "Recording mode off");
                let note = self.notes.finish();
                self.save_note(note.clone()).await;
                Some(PipelineOutcome::NoteSaved(note))
            }
            _ if self.notes.is_active() => {
                self.notes.append(transcript);
                Some(PipelineOutcome::NoteTaken)
            }
            _ => None,
        }
    }

    async fn save_note(&self, note: Option<String>) {
        let Some(note) = note else {
            debug!(call_id = %self.session.call_id, "Nothing dictated, no note saved");
            return;
        };
        if let Err(e) = self
            .services
            .recorder
            .note_saved(&self.session, &note, Utc::now())
            .await
        {
            warn!(call_id = %self.session.call_id, "Failed to save note: {}", e);
        }
    }

    /// System persona, recent history, then the new transcript
    fn prompt(&self, transcript: &str) -> Vec<ChatMessage> {
        let now = Local::now().format("%A, %B %-d, %Y at %-I:%M %p");
        let mut messages = Vec::with_capacity(self.config.history_turns + 2);
        messages.push(ChatMessage::system(format!(
            "{}\n\nThe current date and time is {now}.",
            self.config.persona
        )));
        let skip = self.history.len().saturating_sub(self.config.history_turns);
        messages.extend(self.history[skip..].iter().cloned());
        messages.push(ChatMessage::user(transcript));
        messages
    }

    /// Synthesized speech as 8 kHz samples
    async fn synthesize(&self, text: &str) -> Result<Vec<i16>, ServiceError> {
        let wav = timed(
            self.config.synthesize_timeout,
            self.services.synthesizer.synthesize(text, &self.config.voice),
        )
        .await?;
        let audio = decode_wav(&wav).map_err(|e| ServiceError::Audio(e.to_string()))?;
        Ok(resample(&audio.samples, audio.sample_rate, NARROWBAND_RATE))
    }

    async fn speak(&self, text: &str) -> Result<(), ServiceError> {
        let audio = self.synthesize(text).await?;
        self.engine
            .play_muted(&audio)
            .await
            .map_err(|e| ServiceError::Audio(e.to_string()))?;
        Ok(())
    }

    fn publish_message(&self, role: Role, text: &str) {
        self.events.publish(CallEvent::Message {
            call_id: self.session.call_id.clone(),
            role,
            text: text.to_string(),
        });
    }
}

async fn timed<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ServiceError::Timeout(limit)))
}
