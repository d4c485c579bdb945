//! # Infra-Common: process-wide plumbing for the aibridge gateway
//!
//! - [`logging`]: one-shot `tracing` subscriber setup
//! - [`config`]: typed settings read from the environment and `.env` files

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{BridgeConfig, VadTunables, load_env_file};
pub use errors::{Error, Result};
pub use logging::{LoggingConfig, log_welcome, parse_log_level, setup_logging};
