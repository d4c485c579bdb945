//! Gateway settings read from the process environment
//!
//! Every setting has a default so the gateway starts with an empty
//! environment; only the service credentials are genuinely optional.
//! Values are read through a lookup closure, which keeps parsing testable
//! without touching the real environment.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use crate::errors::{Error, Result};

const DEFAULT_PERSONA: &str = "You are a friendly AI assistant on a phone call. Keep your responses \
short, conversational, and to the point. Avoid long explanations, lists, or formatting. Speak \
naturally, as if you are talking to a friend on the phone.";

/// Voice activity detection knobs exposed through the environment
#[derive(Debug, Clone, PartialEq)]
pub struct VadTunables {
    /// `VAD_CALIBRATION_FRAMES`
    pub calibration_frames: usize,
    /// `VAD_THRESHOLD_MULTIPLIER`
    pub threshold_multiplier: f64,
    /// `VAD_MIN_THRESHOLD`
    pub min_threshold: f64,
    /// `VAD_MAX_THRESHOLD`
    pub max_threshold: f64,
    /// `VAD_SILENCE_MS`
    pub silence_ms: u64,
    /// `VAD_MIN_UTTERANCE_MS`
    pub min_utterance_ms: u64,
    /// `VAD_MAX_UTTERANCE_SECS`
    pub max_utterance_secs: u64,
}

impl Default for VadTunables {
    fn default() -> Self {
        Self {
            calibration_frames: 150,
            threshold_multiplier: 2.0,
            min_threshold: 150.0,
            max_threshold: 2000.0,
            silence_ms: 1500,
            min_utterance_ms: 300,
            max_utterance_secs: 30,
        }
    }
}

/// Flat view of every environment setting the gateway understands
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub sip_bind: IpAddr,
    pub sip_port: u16,
    pub extension: String,
    pub username: String,
    pub advertised_ip: Option<IpAddr>,
    pub rtp_port_min: u16,
    pub rtp_port_max: u16,

    pub groq_api_key: Option<String>,
    /// Transcription endpoint
    pub groq_api_url: String,
    pub groq_model: String,
    pub groq_llm_model: String,
    /// Chat completions endpoint used as the fallback generator
    pub groq_chat_url: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub tts_url: String,
    pub tts_api_key: Option<String>,
    pub tts_voice: String,
    pub persona: String,
    pub welcome_message: String,
    /// Raw fallback policy name, parsed by the service layer
    pub llm_fallback: String,

    pub recordings_dir: Option<PathBuf>,
    pub events_file: Option<PathBuf>,
    pub thinking_tone: bool,
    /// Zero disables the limit
    pub max_call_secs: u64,
    /// Zero disables the limit
    pub inactivity_secs: u64,
    pub vad: VadTunables,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sip_bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            sip_port: 5060,
            extension: "5000".to_string(),
            username: "aibridge".to_string(),
            advertised_ip: None,
            rtp_port_min: 10000,
            rtp_port_max: 10100,
            groq_api_key: None,
            groq_api_url: "https://api.groq.com/openai/v1/audio/transcriptions".to_string(),
            groq_model: "whisper-large-v3".to_string(),
            groq_llm_model: "llama-3.1-8b-instant".to_string(),
            groq_chat_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.1".to_string(),
            tts_url: "http://localhost:5050".to_string(),
            tts_api_key: None,
            tts_voice: "en-US-GuyNeural".to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            welcome_message: "Hello! How can I help you today?".to_string(),
            llm_fallback: "on_unreachable".to_string(),
            recordings_dir: None,
            events_file: None,
            thinking_tone: true,
            max_call_secs: 30 * 60,
            inactivity_secs: 45,
            vad: VadTunables::default(),
        }
    }
}

impl BridgeConfig {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset or blank keys keep their default
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let defaults = Self::default();
        let vad = VadTunables::default();

        let config = Self {
            sip_bind: env.parse("SIP_BIND", defaults.sip_bind)?,
            sip_port: env.parse("SIP_PORT", defaults.sip_port)?,
            extension: env.string("SIP_EXTENSION", defaults.extension),
            username: env.string("SIP_USERNAME", defaults.username),
            advertised_ip: env.optional_parse("SIP_ADVERTISED_IP")?,
            rtp_port_min: env.parse("RTP_PORT_MIN", defaults.rtp_port_min)?,
            rtp_port_max: env.parse("RTP_PORT_MAX", defaults.rtp_port_max)?,
            groq_api_key: env.get("GROQ_API_KEY"),
            groq_api_url: env.string("GROQ_API_URL", defaults.groq_api_url),
            groq_model: env.string("GROQ_MODEL", defaults.groq_model),
            groq_llm_model: env.string("GROQ_LLM_MODEL", defaults.groq_llm_model),
            groq_chat_url: env.string("GROQ_CHAT_URL", defaults.groq_chat_url),
            ollama_url: env.string("OLLAMA_URL", defaults.ollama_url),
            ollama_model: env.string("OLLAMA_MODEL", defaults.ollama_model),
            tts_url: env.string("TTS_URL", defaults.tts_url),
            tts_api_key: env.get("TTS_API_KEY"),
            tts_voice: env.string("TTS_VOICE", defaults.tts_voice),
            persona: env.string("BOT_PERSONA", defaults.persona),
            welcome_message: env.raw("WELCOME_MESSAGE").unwrap_or(defaults.welcome_message),
            llm_fallback: env.string("LLM_FALLBACK", defaults.llm_fallback),
            recordings_dir: env.get("RECORDINGS_DIR").map(PathBuf::from),
            events_file: env.get("EVENTS_FILE").map(PathBuf::from),
            thinking_tone: env.flag("THINKING_TONE", defaults.thinking_tone)?,
            max_call_secs: env.parse("MAX_CALL_SECS", defaults.max_call_secs)?,
            inactivity_secs: env.parse("INACTIVITY_SECS", defaults.inactivity_secs)?,
            vad: VadTunables {
                calibration_frames: env.parse("VAD_CALIBRATION_FRAMES", vad.calibration_frames)?,
                threshold_multiplier: env
                    .parse("VAD_THRESHOLD_MULTIPLIER", vad.threshold_multiplier)?,
                min_threshold: env.parse("VAD_MIN_THRESHOLD", vad.min_threshold)?,
                max_threshold: env.parse("VAD_MAX_THRESHOLD", vad.max_threshold)?,
                silence_ms: env.parse("VAD_SILENCE_MS", vad.silence_ms)?,
                min_utterance_ms: env.parse("VAD_MIN_UTTERANCE_MS", vad.min_utterance_ms)?,
                max_utterance_secs: env.parse("VAD_MAX_UTTERANCE_SECS", vad.max_utterance_secs)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rtp_port_min > self.rtp_port_max {
            return Err(Error::InvalidSetting {
                key: "RTP_PORT_MIN".to_string(),
                value: self.rtp_port_min.to_string(),
                reason: format!("greater than RTP_PORT_MAX ({})", self.rtp_port_max),
            });
        }
        if self.extension.is_empty() {
            return Err(Error::Config("SIP_EXTENSION must not be empty".to_string()));
        }
        if self.vad.max_utterance_secs == 0 {
            return Err(Error::InvalidSetting {
                key: "VAD_MAX_UTTERANCE_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}

/// Load a `.env` file into the process environment.
///
/// With an explicit path the file must exist. Without one, a `.env` in the
/// current directory or its parents is used when present.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)?;
            info!(path = %path.display(), "Loaded environment file");
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(found) => {
                info!(path = %found.display(), "Loaded environment file");
                Ok(Some(found))
            }
            Err(e) if e.not_found() => {
                debug!("No .env file found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        },
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Value with surrounding whitespace kept, even when blank
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: String) -> String {
        self.get(key).unwrap_or(default)
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.optional_parse(key)?.unwrap_or(default))
    }

    fn optional_parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|value| {
                value.parse().map_err(|e: T::Err| Error::InvalidSetting {
                    key: key.to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(Error::InvalidSetting {
                    key: key.to_string(),
                    value,
                    reason: "expected true or false".to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = BridgeConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.groq_model, "whisper-large-v3");
        assert_eq!(config.ollama_model, "llama3.1");
        assert!(config.persona.starts_with("You are a friendly AI assistant"));
    }

    #[test]
    fn test_values_are_parsed() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("SIP_PORT", "5070"),
            ("SIP_EXTENSION", " 6000 "),
            ("SIP_ADVERTISED_IP", "192.0.2.10"),
            ("RTP_PORT_MIN", "20000"),
            ("RTP_PORT_MAX", "20010"),
            ("GROQ_API_KEY", "gsk_test"),
            ("TTS_API_KEY", ""),
            ("LLM_FALLBACK", "never"),
            ("INACTIVITY_SECS", "0"),
            ("THINKING_TONE", "off"),
            ("VAD_SILENCE_MS", "900"),
            ("VAD_THRESHOLD_MULTIPLIER", "2.5"),
        ]))
        .unwrap();

        assert_eq!(config.sip_port, 5070);
        assert_eq!(config.extension, "6000");
        assert_eq!(config.advertised_ip, Some("192.0.2.10".parse().unwrap()));
        assert_eq!((config.rtp_port_min, config.rtp_port_max), (20000, 20010));
        assert_eq!(config.groq_api_key.as_deref(), Some("gsk_test"));
        assert_eq!(config.tts_api_key, None);
        assert_eq!(config.llm_fallback, "never");
        assert_eq!(config.inactivity_secs, 0);
        assert!(!config.thinking_tone);
        assert_eq!(config.vad.silence_ms, 900);
        assert_eq!(config.vad.threshold_multiplier, 2.5);
    }

    #[test]
    fn test_blank_welcome_message_disables_greeting() {
        let config = BridgeConfig::from_lookup(lookup(&[("WELCOME_MESSAGE", "")])).unwrap();
        assert_eq!(config.welcome_message, "");
    }

    #[test]
    fn test_bad_values_name_the_key() {
        let err = BridgeConfig::from_lookup(lookup(&[("SIP_PORT", "http")])).unwrap_err();
        match err {
            Error::InvalidSetting { key, value, .. } => {
                assert_eq!(key, "SIP_PORT");
                assert_eq!(value, "http");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = BridgeConfig::from_lookup(lookup(&[("THINKING_TONE", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("THINKING_TONE"));
    }

    #[test]
    fn test_inverted_rtp_range_is_rejected() {
        let result = BridgeConfig::from_lookup(lookup(&[
            ("RTP_PORT_MIN", "30000"),
            ("RTP_PORT_MAX", "20000"),
        ]));
        assert!(matches!(result, Err(Error::InvalidSetting { .. })));
    }

    #[test]
    fn test_explicit_env_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.env");
        assert!(load_env_file(Some(&missing)).is_err());
    }

    #[test]
    fn test_env_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.env");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "AIBRIDGE_TEST_ENV_FILE_MARKER=loaded").unwrap();
        drop(file);

        let loaded = load_env_file(Some(&path)).unwrap();
        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        assert_eq!(
            std::env::var("AIBRIDGE_TEST_ENV_FILE_MARKER").as_deref(),
            Ok("loaded")
        );
    }
}
