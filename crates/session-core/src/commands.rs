//! Spoken commands that switch the call into note-taking
//!
//! While recording mode is on, transcripts are collected as timestamped
//! lines instead of being answered. The stop phrase hands the collected
//! note to the recorder.

use chrono::{DateTime, Local, Utc};

const START_PHRASES: &[&str] = &["start recording", "take a note", "start taking notes"];
const STOP_PHRASES: &[&str] = &["stop recording", "end note", "stop taking notes"];

/// Recognized voice command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    StartRecording,
    StopRecording,
}

impl VoiceCommand {
    /// Look for a command phrase anywhere in the transcript
    pub fn parse(transcript: &str) -> Option<Self> {
        let text = normalize(transcript);
        let contains = |phrase: &&str| contains_words(&text, phrase);
        if STOP_PHRASES.iter().any(contains) {
            Some(VoiceCommand::StopRecording)
        } else if START_PHRASES.iter().any(contains) {
            Some(VoiceCommand::StartRecording)
        } else {
            None
        }
    }
}

/// Lowercase words separated by single spaces, punctuation removed
pub(crate) fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_words(text: &str, phrase: &str) -> bool {
    let padded = format!(" {text} ");
    padded.contains(&format!(" {phrase} "))
}

/// Note being dictated
#[derive(Debug, Clone, Default)]
pub struct NoteTaker {
    active: bool,
    started_at: Option<DateTime<Utc>>,
    lines: Vec<String>,
}

impl NoteTaker {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn start(&mut self) {
        self.active = true;
        self.started_at = Some(Utc::now());
        self.lines.clear();
    }

    /// Append a transcript with the local wall-clock time
    pub fn append(&mut self, text: &str) {
        self.append_at(Local::now(), text);
    }

    pub fn append_at(&mut self, at: DateTime<Local>, text: &str) {
        self.lines
            .push(format!("[{}] {}", at.format("%H:%M:%S"), text.trim()));
    }

    /// Leave recording mode and return the note, if anything was said
    pub fn finish(&mut self) -> Option<String> {
        self.active = false;
        self.started_at = None;
        let lines = std::mem::take(&mut self.lines);
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}
