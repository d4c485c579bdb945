use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::tone::ToneConfig;
use crate::vad::VadConfig;

/// Media engine configuration shared by every call
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Local address media sockets bind to
    pub bind_ip: IpAddr,
    /// Quiet period after playback before the caller is heard again
    pub settle_delay: Duration,
    /// Send to wherever the caller's RTP actually comes from
    pub symmetric_rtp: bool,
    pub vad: VadConfig,
    /// Write a WAV per call into this directory
    pub recording_dir: Option<PathBuf>,
    pub thinking_tone: Option<ToneConfig>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            settle_delay: Duration::from_millis(500),
            symmetric_rtp: true,
            vad: VadConfig::default(),
            recording_dir: None,
            thinking_tone: Some(ToneConfig::default()),
        }
    }
}

impl MediaConfig {
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_symmetric_rtp(mut self, enabled: bool) -> Self {
        self.symmetric_rtp = enabled;
        self
    }

    pub fn with_vad(mut self, vad: VadConfig) -> Self {
        self.vad = vad;
        self
    }

    pub fn with_recording_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.recording_dir = dir;
        self
    }

    pub fn with_thinking_tone(mut self, tone: Option<ToneConfig>) -> Self {
        self.thinking_tone = tone;
        self
    }
}
