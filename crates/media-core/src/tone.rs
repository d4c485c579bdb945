//! "Thinking" tone played while a reply is being generated

use std::f64::consts::PI;
use std::time::Duration;

/// Beep shape. The defaults give a quiet 500 Hz blip every 800ms.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneConfig {
    pub frequency_hz: f64,
    pub beep: Duration,
    pub pause: Duration,
    pub fade: Duration,
    /// Peak amplitude as a fraction of full scale
    pub volume: f64,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 500.0,
            beep: Duration::from_millis(300),
            pause: Duration::from_millis(500),
            fade: Duration::from_millis(50),
            volume: 0.05,
        }
    }
}

impl ToneConfig {
    /// One beep with linear fade in and out
    pub fn beep_samples(&self, sample_rate: u32) -> Vec<i16> {
        let rate = f64::from(sample_rate);
        let len = (self.beep.as_secs_f64() * rate).round() as usize;
        let fade = ((self.fade.as_secs_f64() * rate).round() as usize).min(len / 2);
        let amplitude = self.volume.clamp(0.0, 1.0) * f64::from(i16::MAX);

        (0..len)
            .map(|i| {
                let envelope = if fade == 0 {
                    1.0
                } else if i < fade {
                    i as f64 / fade as f64
                } else if i >= len - fade {
                    (len - 1 - i) as f64 / fade as f64
                } else {
                    1.0
                };
                let phase = 2.0 * PI * self.frequency_hz * i as f64 / rate;
                (phase.sin() * amplitude * envelope).round() as i16
            })
            .collect()
    }

    /// Silent gap between beeps in samples
    pub fn pause_samples(&self, sample_rate: u32) -> u32 {
        (self.pause.as_secs_f64() * f64::from(sample_rate)).round() as u32
    }
}
