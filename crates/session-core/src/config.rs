//! Session and pipeline configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use aibridge_media_core::MediaConfig;

/// Default words the transcription model produces on silence or noise
pub const DEFAULT_HALLUCINATIONS: &[&str] = &[
    "thank you",
    "thanks",
    "bye",
    "goodbye",
    "thank you for watching",
    "you",
];

/// Signaling configuration for the gateway
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Address the SIP socket listens on
    pub bind_addr: SocketAddr,
    /// Extension calls must be addressed to
    pub extension: String,
    /// User part of our Contact and SDP origin
    pub username: String,
    /// IP to put in SDP and Contact; discovered per call when unset
    pub advertised_ip: Option<IpAddr>,
    pub rtp_port_min: u16,
    pub rtp_port_max: u16,
    /// How long to wait for the ACK to our 200 OK
    pub ack_timeout: Duration,
    pub max_call_duration: Option<Duration>,
    /// End the call after this long with no speech and no playback
    pub inactivity_timeout: Option<Duration>,
    /// Delay between "ended" and "idle" notifications
    pub idle_notice_delay: Duration,
    pub watchdog_interval: Duration,
    pub user_agent: String,
    pub media: MediaConfig,
    pub pipeline: PipelineConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5060),
            extension: "5000".to_string(),
            username: "aibridge".to_string(),
            advertised_ip: None,
            rtp_port_min: 10000,
            rtp_port_max: 10100,
            ack_timeout: Duration::from_secs(32),
            max_call_duration: Some(Duration::from_secs(30 * 60)),
            inactivity_timeout: Some(Duration::from_secs(45)),
            idle_notice_delay: Duration::from_secs(1),
            watchdog_interval: Duration::from_secs(1),
            user_agent: format!("aibridge/{}", env!("CARGO_PKG_VERSION")),
            media: MediaConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_advertised_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.advertised_ip = ip;
        self
    }

    pub fn with_rtp_ports(mut self, min: u16, max: u16) -> Self {
        self.rtp_port_min = min;
        self.rtp_port_max = max;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_max_call_duration(mut self, limit: Option<Duration>) -> Self {
        self.max_call_duration = limit;
        self
    }

    pub fn with_inactivity_timeout(mut self, limit: Option<Duration>) -> Self {
        self.inactivity_timeout = limit;
        self
    }

    pub fn with_idle_notice_delay(mut self, delay: Duration) -> Self {
        self.idle_notice_delay = delay;
        self
    }

    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    pub fn with_media(mut self, media: MediaConfig) -> Self {
        self.media = media;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Per-utterance AI pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub transcribe_timeout: Duration,
    pub generate_timeout: Duration,
    pub synthesize_timeout: Duration,
    /// Chat messages of history sent with each request
    pub history_turns: usize,
    /// Utterances quieter than this RMS are not transcribed
    pub min_energy: f64,
    /// Peak level utterances are normalized to, as a fraction of full scale
    pub normalize_peak: f64,
    pub voice: String,
    pub persona: String,
    /// Spoken after the call is answered; nothing is played when empty
    pub welcome_text: String,
    /// Lowercased transcripts that are treated as noise
    pub hallucinations: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transcribe_timeout: Duration::from_secs(15),
            generate_timeout: Duration::from_secs(30),
            synthesize_timeout: Duration::from_secs(20),
            history_turns: 10,
            min_energy: 50.0,
            normalize_peak: 0.9,
            voice: "en-US-GuyNeural".to_string(),
            persona: "You are a friendly AI assistant on a phone call. Keep your responses \
                      short, conversational, and to the point. Avoid long explanations, lists, \
                      or formatting. Speak naturally, as if you are talking to a friend on the phone."
                .to_string(),
            welcome_text: "Hello! How can I help you today?".to_string(),
            hallucinations: DEFAULT_HALLUCINATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    pub fn with_timeouts(mut self, transcribe: Duration, generate: Duration, synthesize: Duration) -> Self {
        self.transcribe_timeout = transcribe;
        self.generate_timeout = generate;
        self.synthesize_timeout = synthesize;
        self
    }

    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn with_min_energy(mut self, rms: f64) -> Self {
        self.min_energy = rms;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_welcome_text(mut self, text: impl Into<String>) -> Self {
        self.welcome_text = text.into();
        self
    }

    /// Whether `transcript` is one of the known noise transcripts
    pub fn is_hallucination(&self, transcript: &str) -> bool {
        let text = transcript.trim().trim_end_matches(['.', '!']).trim().to_lowercase();
        self.hallucinations.iter().any(|h| *h == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hallucinations_ignore_case_and_trailing_period() {
        let config = PipelineConfig::default();
        assert!(config.is_hallucination("Thank you."));
        assert!(config.is_hallucination(" you "));
        assert!(config.is_hallucination("Bye!"));
        assert!(!config.is_hallucination("Thank you for the help"));
        assert!(!config.is_hallucination("What time is it?"));
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.bind_addr.port(), 5060);
        assert_eq!(config.inactivity_timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.pipeline.history_turns, 10);
        assert!(config.user_agent.starts_with("aibridge/"));
    }
}
