//! Voice Activity Detection (VAD) and utterance segmentation
//!
//! [`UtteranceBuffer`] turns a stream of 20ms frames into complete
//! utterances. It is a plain value: the receive loop feeds it frames and
//! acts on the returned [`VadEvent`]. Time is counted in samples so the
//! behaviour is identical in tests and on a live call.
//!
//! The energy threshold adapts to the line. The first frames after the
//! buffer is created (or recalibrated) are only measured: the median RMS is
//! taken as the noise floor and the spread up to the 75th percentile sets
//! how far above the floor speech has to be.

use std::collections::VecDeque;
use std::time::Duration;

use aibridge_codec_core::{FRAME_SAMPLES, NARROWBAND_RATE, rms};
use tracing::{debug, trace};

/// Configuration for voice activity detection
#[derive(Debug, Clone, PartialEq)]
pub struct VadConfig {
    /// Sample rate of the frames fed to the buffer
    pub sample_rate: u32,
    /// Samples per analysis frame
    pub frame_samples: usize,
    /// Frames measured before the threshold is fixed (150 = 3s)
    pub calibration_frames: usize,
    /// Threshold = floor + multiplier * (p75 - floor)
    pub threshold_multiplier: f64,
    /// Lower clamp for the adaptive threshold
    pub min_threshold: f64,
    /// Upper clamp for the adaptive threshold
    pub max_threshold: f64,
    /// Consecutive loud frames needed to start an utterance
    pub onset_frames: usize,
    /// Frames kept from before the onset and prepended to the utterance
    pub pre_roll_frames: usize,
    /// Silence that ends an utterance
    pub silence_duration: Duration,
    /// Voiced audio shorter than this is discarded
    pub min_utterance: Duration,
    /// Utterances are cut at this length
    pub max_utterance: Duration,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: NARROWBAND_RATE,
            frame_samples: FRAME_SAMPLES,
            calibration_frames: 150,
            threshold_multiplier: 2.0,
            min_threshold: 150.0,
            max_threshold: 2000.0,
            onset_frames: 4,
            pre_roll_frames: 20,
            silence_duration: Duration::from_millis(1500),
            min_utterance: Duration::from_millis(300),
            max_utterance: Duration::from_secs(30),
        }
    }
}

impl VadConfig {
    pub fn with_calibration_frames(mut self, frames: usize) -> Self {
        self.calibration_frames = frames;
        self
    }

    pub fn with_threshold_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_threshold = min.min(max);
        self.max_threshold = max.max(min);
        self
    }

    pub fn with_threshold_multiplier(mut self, multiplier: f64) -> Self {
        self.threshold_multiplier = multiplier;
        self
    }

    pub fn with_onset_frames(mut self, frames: usize) -> Self {
        self.onset_frames = frames.max(1);
        self
    }

    pub fn with_silence_duration(mut self, duration: Duration) -> Self {
        self.silence_duration = duration;
        self
    }

    pub fn with_min_utterance(mut self, duration: Duration) -> Self {
        self.min_utterance = duration;
        self
    }

    pub fn with_max_utterance(mut self, duration: Duration) -> Self {
        self.max_utterance = duration;
        self
    }

    fn samples_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * f64::from(self.sample_rate)).round() as usize
    }

    pub fn silence_samples(&self) -> usize {
        self.samples_for(self.silence_duration)
    }

    pub fn min_samples(&self) -> usize {
        self.samples_for(self.min_utterance)
    }

    pub fn max_samples(&self) -> usize {
        self.samples_for(self.max_utterance).max(1)
    }
}

/// A completed utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Cut at the maximum length instead of ending in silence
    pub forced: bool,
}

impl Utterance {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Outcome of feeding one frame
#[derive(Debug, Clone, PartialEq)]
pub enum VadEvent {
    /// Frame consumed by calibration
    Calibrating,
    /// Calibration finished with this frame
    Calibrated { noise_floor: f64, threshold: f64 },
    /// No utterance in progress
    Silence,
    /// Onset confirmed, buffering started
    SpeechStarted,
    /// Frame appended to the utterance in progress
    Speech,
    /// Utterance finished
    Completed(Utterance),
    /// Utterance finished but had too little voiced audio
    Discarded { voiced_samples: usize },
}

/// Adaptive-threshold utterance segmenter
#[derive(Debug, Clone)]
pub struct UtteranceBuffer {
    config: VadConfig,
    calibration: Vec<f64>,
    calibrated: bool,
    noise_floor: f64,
    threshold: f64,
    pre_roll: VecDeque<Vec<i16>>,
    consecutive_speech: usize,
    in_speech: bool,
    samples: Vec<i16>,
    /// Samples since the last loud frame of the utterance
    trailing_silence: usize,
}

impl UtteranceBuffer {
    pub fn new(config: VadConfig) -> Self {
        let threshold = config.min_threshold;
        let calibrated = config.calibration_frames == 0;
        Self {
            calibration: Vec::with_capacity(config.calibration_frames),
            pre_roll: VecDeque::with_capacity(config.pre_roll_frames + 1),
            config,
            calibrated,
            noise_floor: 0.0,
            threshold,
            consecutive_speech: 0,
            in_speech: false,
            samples: Vec::new(),
            trailing_silence: 0,
        }
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn noise_floor(&self) -> f64 {
        self.noise_floor
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn is_in_speech(&self) -> bool {
        self.in_speech
    }

    /// Samples of the utterance in progress
    pub fn buffered_samples(&self) -> usize {
        self.samples.len()
    }

    /// Drop any partial utterance; the threshold is kept
    pub fn reset(&mut self) {
        self.samples.clear();
        self.pre_roll.clear();
        self.consecutive_speech = 0;
        self.in_speech = false;
        self.trailing_silence = 0;
    }

    /// Drop any partial utterance and measure the line again
    pub fn recalibrate(&mut self) {
        self.reset();
        self.calibration.clear();
        self.calibrated = self.config.calibration_frames == 0;
        debug!("VAD recalibration requested");
    }

    /// Feed one frame
    pub fn push_frame(&mut self, frame: &[i16]) -> VadEvent {
        let energy = rms(frame);

        if !self.calibrated {
            self.calibration.push(energy);
            if self.calibration.len() < self.config.calibration_frames {
                return VadEvent::Calibrating;
            }
            self.finish_calibration();
            return VadEvent::Calibrated {
                noise_floor: self.noise_floor,
                threshold: self.threshold,
            };
        }

        let loud = energy > self.threshold;
        trace!(energy, threshold = self.threshold, loud, "VAD frame");

        if !self.in_speech {
            self.pre_roll.push_back(frame.to_vec());
            while self.pre_roll.len() > self.config.pre_roll_frames.max(1) {
                self.pre_roll.pop_front();
            }
            if !loud {
                self.consecutive_speech = 0;
                return VadEvent::Silence;
            }
            self.consecutive_speech += 1;
            if self.consecutive_speech < self.config.onset_frames {
                return VadEvent::Silence;
            }

            // The pre-roll already holds the current frame
            self.in_speech = true;
            self.trailing_silence = 0;
            let max = self.config.max_samples();
            for past in self.pre_roll.drain(..) {
                let room = max - self.samples.len();
                self.samples.extend_from_slice(&past[..past.len().min(room)]);
            }
            debug!(threshold = self.threshold, "Speech started");
            if self.samples.len() >= max {
                return self.complete(true);
            }
            return VadEvent::SpeechStarted;
        }

        let max = self.config.max_samples();
        let room = max - self.samples.len();
        let taken = frame.len().min(room);
        self.samples.extend_from_slice(&frame[..taken]);
        if loud {
            self.trailing_silence = 0;
        } else {
            self.trailing_silence += taken;
        }

        if self.samples.len() >= max {
            return self.complete(true);
        }
        if self.trailing_silence >= self.config.silence_samples() {
            return self.complete(false);
        }
        VadEvent::Speech
    }

    fn finish_calibration(&mut self) {
        let mut sorted = std::mem::take(&mut self.calibration);
        sorted.sort_by(|a, b| a.total_cmp(b));
        let len = sorted.len();
        let floor = sorted[len / 2];
        let p75 = sorted[((len as f64 * 0.75) as usize).min(len - 1)];
        let threshold = floor + (p75 - floor) * self.config.threshold_multiplier;

        self.noise_floor = floor;
        self.threshold = threshold.clamp(self.config.min_threshold, self.config.max_threshold);
        self.calibrated = true;
        debug!(
            noise_floor = floor,
            p75,
            threshold = self.threshold,
            "VAD calibrated"
        );
    }

    fn complete(&mut self, forced: bool) -> VadEvent {
        let samples = std::mem::take(&mut self.samples);
        let voiced = samples.len() - self.trailing_silence.min(samples.len());
        self.reset();

        if voiced < self.config.min_samples() {
            debug!(voiced, "Utterance too short, discarded");
            return VadEvent::Discarded {
                voiced_samples: voiced,
            };
        }
        debug!(samples = samples.len(), forced, "Utterance complete");
        VadEvent::Completed(Utterance {
            samples,
            sample_rate: self.config.sample_rate,
            forced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: i16 = 20;
    const LOUD: i16 = 3000;

    fn frame(level: i16) -> Vec<i16> {
        // Square wave so RMS equals the level
        (0..FRAME_SAMPLES)
            .map(|i| if i % 2 == 0 { level } else { -level })
            .collect()
    }

    fn calibrated() -> UtteranceBuffer {
        UtteranceBuffer::new(VadConfig::default().with_calibration_frames(0))
    }

    fn feed(buffer: &mut UtteranceBuffer, level: i16, frames: usize) -> Vec<VadEvent> {
        (0..frames).map(|_| buffer.push_frame(&frame(level))).collect()
    }

    fn completions(events: &[VadEvent]) -> Vec<&Utterance> {
        events
            .iter()
            .filter_map(|e| match e {
                VadEvent::Completed(u) => Some(u),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_calibration_sets_clamped_threshold() {
        let mut buffer = UtteranceBuffer::new(VadConfig::default().with_calibration_frames(4));
        assert_eq!(buffer.push_frame(&frame(100)), VadEvent::Calibrating);
        assert_eq!(buffer.push_frame(&frame(200)), VadEvent::Calibrating);
        assert_eq!(buffer.push_frame(&frame(300)), VadEvent::Calibrating);
        // sorted [100,200,300,400]: floor = 300, p75 = 400 -> 300 + 2*100
        match buffer.push_frame(&frame(400)) {
            VadEvent::Calibrated {
                noise_floor,
                threshold,
            } => {
                assert!((noise_floor - 300.0).abs() < 1.0);
                assert!((threshold - 500.0).abs() < 1.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(buffer.is_calibrated());

        let mut quiet_line = UtteranceBuffer::new(VadConfig::default().with_calibration_frames(3));
        feed(&mut quiet_line, 5, 3);
        assert_eq!(quiet_line.threshold(), 150.0);

        let mut noisy_line = UtteranceBuffer::new(VadConfig::default().with_calibration_frames(2));
        feed(&mut noisy_line, 10000, 2);
        assert_eq!(noisy_line.threshold(), 2000.0);
    }

    #[test]
    fn test_calibration_frames_are_not_buffered() {
        let mut buffer = UtteranceBuffer::new(VadConfig::default().with_calibration_frames(10));
        let events = feed(&mut buffer, LOUD, 9);
        assert!(events.iter().all(|e| *e == VadEvent::Calibrating));
        assert_eq!(buffer.buffered_samples(), 0);
    }

    #[test]
    fn test_onset_needs_consecutive_loud_frames() {
        let mut buffer = calibrated();
        for _ in 0..5 {
            feed(&mut buffer, LOUD, 3);
            feed(&mut buffer, QUIET, 1);
        }
        assert!(!buffer.is_in_speech());
        let events = feed(&mut buffer, LOUD, 4);
        assert_eq!(events[3], VadEvent::SpeechStarted);
    }

    #[test]
    fn test_pre_roll_is_prepended_once() {
        let mut buffer = calibrated();
        feed(&mut buffer, QUIET, 30);
        feed(&mut buffer, LOUD, 4);
        // 20 pre-roll frames, the last 4 of which are the onset
        assert_eq!(buffer.buffered_samples(), 20 * FRAME_SAMPLES);
    }

    #[test]
    fn test_silence_run_completes_exactly_once() {
        let mut buffer = calibrated();
        feed(&mut buffer, LOUD, 50);
        let events = feed(&mut buffer, QUIET, 200);
        let done = completions(&events);
        assert_eq!(done.len(), 1);
        assert!(!done[0].forced);
        // 50 loud frames then 75 silent ones (1.5s)
        assert_eq!(done[0].samples.len(), (20 + 30 + 75) * FRAME_SAMPLES);
        assert_eq!(buffer.buffered_samples(), 0);
        assert!(!buffer.is_in_speech());
    }

    #[test]
    fn test_short_blip_is_discarded() {
        let mut buffer = UtteranceBuffer::new(
            VadConfig::default()
                .with_calibration_frames(0)
                .with_min_utterance(Duration::from_millis(600)),
        );
        feed(&mut buffer, LOUD, 4);
        let events = feed(&mut buffer, QUIET, 100);
        assert!(completions(&events).is_empty());
        assert!(events.iter().any(|e| matches!(e, VadEvent::Discarded { .. })));
    }

    #[test]
    fn test_never_emits_below_minimum() {
        for loud_frames in 4..40 {
            let mut buffer = calibrated();
            feed(&mut buffer, LOUD, loud_frames);
            let events = feed(&mut buffer, QUIET, 100);
            let min = buffer.config().min_samples();
            let silence = buffer.config().silence_samples();
            for u in completions(&events) {
                assert!(u.samples.len() - silence >= min);
            }
        }
    }

    #[test]
    fn test_max_length_forces_completion() {
        let mut buffer = UtteranceBuffer::new(
            VadConfig::default()
                .with_calibration_frames(0)
                .with_max_utterance(Duration::from_secs(1)),
        );
        let events = feed(&mut buffer, LOUD, 60);
        let done = completions(&events);
        assert_eq!(done.len(), 1);
        assert!(done[0].forced);
        assert_eq!(done[0].samples.len(), 8000);
        assert!(buffer.buffered_samples() <= buffer.config().max_samples());
    }

    #[test]
    fn test_reset_keeps_threshold_recalibrate_does_not() {
        let mut buffer = UtteranceBuffer::new(VadConfig::default().with_calibration_frames(2));
        feed(&mut buffer, 400, 2);
        let threshold = buffer.threshold();
        feed(&mut buffer, LOUD, 10);
        assert!(buffer.is_in_speech());

        buffer.reset();
        assert!(!buffer.is_in_speech());
        assert_eq!(buffer.buffered_samples(), 0);
        assert_eq!(buffer.threshold(), threshold);
        assert!(buffer.is_calibrated());

        buffer.recalibrate();
        assert!(!buffer.is_calibrated());
        assert_eq!(buffer.push_frame(&frame(LOUD)), VadEvent::Calibrating);
    }
}
