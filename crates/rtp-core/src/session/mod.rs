//! Outbound stream state

mod scheduling;
mod sequencer;

pub use scheduling::PacketClock;
pub use sequencer::RtpSequencer;
