//! Inbound audio path: mute gate, framing and VAD
//!
//! RTP payload sizes are up to the caller's ptime, so decoded samples are
//! re-cut into fixed analysis frames before they reach the
//! [`UtteranceBuffer`].

use tracing::debug;

use crate::mute::{Admission, MuteGate};
use crate::vad::{UtteranceBuffer, VadConfig, VadEvent};

/// Per-call inbound audio state, owned by the receive loop
#[derive(Debug)]
pub struct InboundAudio {
    buffer: UtteranceBuffer,
    gate: MuteGate,
    seen_epoch: u64,
    pending: Vec<i16>,
    frame_samples: usize,
}

impl InboundAudio {
    pub fn new(config: VadConfig, gate: MuteGate) -> Self {
        let frame_samples = config.frame_samples.max(1);
        let seen_epoch = gate.epoch();
        Self {
            buffer: UtteranceBuffer::new(config),
            gate,
            seen_epoch,
            pending: Vec::with_capacity(frame_samples * 2),
            frame_samples,
        }
    }

    pub fn buffer(&self) -> &UtteranceBuffer {
        &self.buffer
    }

    /// Feed decoded samples; returns the VAD events of every complete frame
    pub fn ingest(&mut self, samples: &[i16]) -> Vec<VadEvent> {
        match self.gate.admit(&mut self.seen_epoch) {
            Admission::Muted => {
                self.pending.clear();
                return Vec::new();
            }
            Admission::Reopened { recalibrate } => {
                self.pending.clear();
                if recalibrate {
                    self.buffer.recalibrate();
                } else {
                    self.buffer.reset();
                }
                debug!(recalibrate, "Listening again after playback");
            }
            Admission::Open => {}
        }

        self.pending.extend_from_slice(samples);
        let whole = self.pending.len() / self.frame_samples * self.frame_samples;
        let events = self.pending[..whole]
            .chunks_exact(self.frame_samples)
            .map(|frame| self.buffer.push_frame(frame))
            .collect();
        self.pending.drain(..whole);
        events
    }
}
