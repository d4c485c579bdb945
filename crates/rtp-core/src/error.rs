use thiserror::Error;

/// Errors raised by the RTP layer
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer too small to hold the declared structure
    #[error("Buffer too small: required {required}, available {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// Packet violates the RTP wire format
    #[error("Invalid RTP packet: {0}")]
    InvalidPacket(String),

    /// Every port in the configured range is taken and fallback failed
    #[error("No media port available in {min}-{max}: {reason}")]
    PortExhausted { min: u16, max: u16, reason: String },

    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
