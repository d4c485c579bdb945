//! RTP building blocks for the voice gateway
//!
//! - [`packet`]: RFC 3550 fixed header plus payload, parse and serialize
//! - [`session`]: outbound sequencing and the 20ms pacing clock
//! - [`stats`]: receive-side sequence tracking
//! - [`transport`]: media port allocation from a configured range

pub mod error;
pub mod packet;
pub mod session;
pub mod stats;
pub mod transport;

pub use error::Error;
pub use packet::{RtpHeader, RtpPacket};
pub use session::{PacketClock, RtpSequencer};
pub use stats::{ReceiveTracker, RtpStats, SequenceVerdict};
pub use transport::{BoundPort, PortAllocator, PortLease};

/// Result type for RTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// RTP sequence number (wraps at 65535)
pub type RtpSequenceNumber = u16;

/// RTP timestamp in sample clock units
pub type RtpTimestamp = u32;

/// Synchronization source identifier
pub type RtpSsrc = u32;

/// Contributing source identifier
pub type RtpCsrc = u32;

/// Protocol version carried in every packet
pub const RTP_VERSION: u8 = 2;

/// Size of the fixed header without CSRCs or extensions
pub const RTP_MIN_HEADER_SIZE: usize = 12;

/// Dynamic payload type we advertise for RFC 4733 telephone events
pub const TELEPHONE_EVENT_PAYLOAD_TYPE: u8 = 101;
