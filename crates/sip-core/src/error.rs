use thiserror::Error;

/// Result alias for SIP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the SIP message layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Message could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A header required for processing is absent
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// Status code outside 100-699
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// SDP body is missing or malformed
    #[error("Invalid SDP: {0}")]
    InvalidSdp(String),

    /// SDP is well formed but offers nothing we can accept
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::ParseError(format!("invalid UTF-8: {err}"))
    }
}
