//! Receive-side statistics
//!
//! Tracks the inbound sequence space so gaps, duplicates and reordering can
//! be logged and reported at hangup. Packets are never held back or
//! reordered; the tracker only classifies them.

use crate::RtpSequenceNumber;

/// RTP packet statistics for one call leg
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpStats {
    /// Total number of RTP packets sent
    pub packets_sent: u64,

    /// Total number of RTP bytes sent
    pub bytes_sent: u64,

    /// Total number of RTP packets received
    pub packets_received: u64,

    /// Total number of RTP bytes received
    pub bytes_received: u64,

    /// Packets lost (based on sequence numbers)
    pub packets_lost: u64,

    /// Duplicate packets received
    pub packets_duplicated: u64,

    /// Out-of-order packets received
    pub packets_out_of_order: u64,

    /// Packets dropped because they came from an unexpected source
    pub packets_rejected: u64,

    /// Extended highest sequence number (cycles << 16 | seq)
    pub highest_seq: u32,

    /// First sequence number received (base sequence)
    pub base_seq: Option<RtpSequenceNumber>,
}

/// How an arriving packet relates to what was seen before
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceVerdict {
    /// First packet or the immediate successor
    InOrder,
    /// Ahead of the expected sequence, skipping `missing` packets
    Gap { missing: u16 },
    /// Older than the highest seen but not seen before
    OutOfOrder,
    /// Already received
    Duplicate,
}

const HISTORY_BITS: u16 = 64;

/// Sequence tracker for the inbound stream
#[derive(Debug, Clone, Default)]
pub struct ReceiveTracker {
    stats: RtpStats,
    highest: Option<RtpSequenceNumber>,
    cycles: u32,
    /// Bit n set = (highest - n) received
    history: u64,
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an arriving packet and update counters
    pub fn record(&mut self, seq: RtpSequenceNumber, bytes: usize) -> SequenceVerdict {
        self.stats.packets_received += 1;
        self.stats.bytes_received += bytes as u64;

        let Some(highest) = self.highest else {
            self.highest = Some(seq);
            self.history = 1;
            self.stats.base_seq = Some(seq);
            self.stats.highest_seq = u32::from(seq);
            return SequenceVerdict::InOrder;
        };

        let delta = seq.wrapping_sub(highest) as i16;
        let verdict = if delta > 0 {
            let ahead = delta as u16;
            if seq < highest {
                self.cycles += 1;
            }
            self.history = if ahead < HISTORY_BITS {
                (self.history << ahead) | 1
            } else {
                1
            };
            self.highest = Some(seq);
            self.stats.highest_seq = (self.cycles << 16) | u32::from(seq);
            if ahead == 1 {
                SequenceVerdict::InOrder
            } else {
                self.stats.packets_lost += u64::from(ahead - 1);
                SequenceVerdict::Gap { missing: ahead - 1 }
            }
        } else if delta == 0 {
            SequenceVerdict::Duplicate
        } else {
            let behind = delta.unsigned_abs();
            if behind < HISTORY_BITS {
                let bit = 1u64 << behind;
                if self.history & bit != 0 {
                    SequenceVerdict::Duplicate
                } else {
                    self.history |= bit;
                    // A late arrival fills a gap counted as loss
                    self.stats.packets_lost = self.stats.packets_lost.saturating_sub(1);
                    SequenceVerdict::OutOfOrder
                }
            } else {
                SequenceVerdict::OutOfOrder
            }
        };

        match verdict {
            SequenceVerdict::Duplicate => self.stats.packets_duplicated += 1,
            SequenceVerdict::OutOfOrder => self.stats.packets_out_of_order += 1,
            _ => {}
        }
        verdict
    }

    /// Count a packet dropped before sequence tracking
    pub fn record_rejected(&mut self) {
        self.stats.packets_rejected += 1;
    }

    /// Count an outbound packet
    pub fn record_sent(&mut self, bytes: usize) {
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;
    }

    pub fn stats(&self) -> &RtpStats {
        &self.stats
    }
}
