use thiserror::Error;

/// Result alias for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while setting up the process
#[derive(Debug, Error)]
pub enum Error {
    /// A setting is present but unusable
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },

    /// Environment file could not be read
    #[error("Cannot load environment file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    /// Logging could not be initialized
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
