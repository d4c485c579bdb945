use std::io;
use thiserror::Error;

use aibridge_codec_core::CodecError;

/// Result type for media operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for media operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// RTP layer error (packet codec, port allocation)
    #[error("RTP error: {0}")]
    Rtp(#[from] aibridge_rtp_core::Error),

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Call recording could not be written
    #[error("Recording error: {0}")]
    Recording(String),

    /// Playback requested before the remote endpoint is known
    #[error("No remote address set")]
    NoRemoteAddress,

    /// Engine was already started
    #[error("Media engine already started")]
    AlreadyStarted,

    /// Engine was stopped
    #[error("Media engine stopped")]
    EngineStopped,
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Error::Recording(err.to_string())
    }
}
