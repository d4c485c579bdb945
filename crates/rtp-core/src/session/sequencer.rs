use bytes::Bytes;
use tracing::debug;

use crate::packet::RtpPacket;
use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// Outbound sequence/timestamp state for one RTP stream
///
/// Initial sequence number, timestamp and SSRC are random. Every packet
/// advances the sequence by one and the timestamp by the samples it carries;
/// both wrap.
#[derive(Debug, Clone)]
pub struct RtpSequencer {
    ssrc: RtpSsrc,
    payload_type: u8,
    sequence: RtpSequenceNumber,
    timestamp: RtpTimestamp,
    pending_marker: bool,
    packets_sent: u64,
}

impl RtpSequencer {
    /// Create a sequencer with random initial values
    pub fn new(payload_type: u8) -> Self {
        Self::with_initial(
            payload_type,
            rand::random::<u16>(),
            rand::random::<u32>(),
            rand::random::<u32>(),
        )
    }

    /// Create a sequencer with explicit initial values
    pub fn with_initial(
        payload_type: u8,
        sequence: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
    ) -> Self {
        debug!(
            "RTP sequencer: ssrc={:#010x} seq={} ts={} pt={}",
            ssrc, sequence, timestamp, payload_type
        );
        Self {
            ssrc,
            payload_type,
            sequence,
            timestamp,
            pending_marker: true,
            packets_sent: 0,
        }
    }

    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    pub fn next_sequence(&self) -> RtpSequenceNumber {
        self.sequence
    }

    pub fn next_timestamp(&self) -> RtpTimestamp {
        self.timestamp
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Flag the next packet as the start of a talkspurt
    pub fn start_talkspurt(&mut self) {
        self.pending_marker = true;
    }

    /// Account for `samples` of audio that were not sent (a pause between
    /// tones). The next packet starts a new talkspurt.
    pub fn skip(&mut self, samples: u32) {
        self.timestamp = self.timestamp.wrapping_add(samples);
        self.pending_marker = true;
    }

    /// Build the next packet carrying `payload` worth `samples` clock ticks
    pub fn next_packet(&mut self, payload: Bytes, samples: u32) -> RtpPacket {
        let mut packet =
            RtpPacket::new_with_payload(self.payload_type, self.sequence, self.timestamp, self.ssrc, payload);
        packet.header.marker = std::mem::take(&mut self.pending_marker);

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(samples);
        self.packets_sent += 1;
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_and_timestamp_advance() {
        let mut seq = RtpSequencer::with_initial(0, 100, 1000, 7);
        let a = seq.next_packet(Bytes::from_static(&[0xFF; 160]), 160);
        let b = seq.next_packet(Bytes::from_static(&[0xFF; 160]), 160);
        assert_eq!(a.header.sequence_number, 100);
        assert_eq!(b.header.sequence_number, 101);
        assert_eq!(b.header.timestamp - a.header.timestamp, 160);
        assert_eq!(a.header.ssrc, 7);
        assert!(a.header.marker);
        assert!(!b.header.marker);
        assert_eq!(seq.packets_sent(), 2);
    }

    #[test]
    fn test_wraparound() {
        let mut seq = RtpSequencer::with_initial(0, u16::MAX, u32::MAX - 100, 1);
        let a = seq.next_packet(Bytes::new(), 160);
        let b = seq.next_packet(Bytes::new(), 160);
        assert_eq!(a.header.sequence_number, u16::MAX);
        assert_eq!(b.header.sequence_number, 0);
        assert_eq!(b.header.timestamp, 59);
    }

    #[test]
    fn test_talkspurt_marker() {
        let mut seq = RtpSequencer::with_initial(0, 0, 0, 1);
        seq.next_packet(Bytes::new(), 160);
        seq.start_talkspurt();
        assert!(seq.next_packet(Bytes::new(), 160).header.marker);
    }

    #[test]
    fn test_skip_advances_timestamp_only() {
        let mut seq = RtpSequencer::with_initial(0, 5, 1000, 1);
        seq.next_packet(Bytes::new(), 160);
        seq.skip(4000);
        let p = seq.next_packet(Bytes::new(), 160);
        assert_eq!(p.header.sequence_number, 6);
        assert_eq!(p.header.timestamp, 1000 + 160 + 4000);
        assert!(p.header.marker);
    }
}
