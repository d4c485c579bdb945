use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::errors::{Error, Result};

/// Noisy dependencies kept at warn unless RUST_LOG says otherwise
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// How the gateway's log output looks
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default verbosity when RUST_LOG is unset
    pub level: Level,
    /// One JSON object per line instead of human-readable text
    pub json: bool,
    /// Source file and line on every record
    pub show_location: bool,
    /// Log span enter and exit
    pub span_events: bool,
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            show_location: false,
            span_events: false,
            app_name: "aibridge".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        Self {
            level,
            app_name: app_name.into(),
            ..Self::default()
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_location(mut self) -> Self {
        self.show_location = true;
        self
    }

    pub fn with_span_events(mut self) -> Self {
        self.span_events = true;
        self
    }

    /// Filter built from RUST_LOG, falling back to the configured level
    pub fn filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let mut filter = EnvFilter::new(self.level.as_str());
        for target in QUIET_TARGETS {
            let directive = target
                .parse()
                .map_err(|e| Error::Logging(format!("bad directive {target}: {e}")))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

/// Install the global subscriber. Fails when one is already installed.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let spans = if config.span_events { FmtSpan::ACTIVE } else { FmtSpan::NONE };
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(config.filter()?)
        .with_span_events(spans)
        .with_file(config.show_location)
        .with_line_number(config.show_location);

    let installed = if config.json {
        subscriber.with_writer(std::io::stdout).json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| Error::Logging(e.to_string()))
}

/// Level named on the command line, case-insensitive
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level.trim()).map_err(|_| Error::InvalidSetting {
        key: "log level".to_string(),
        value: level.to_string(),
        reason: "expected trace, debug, info, warn or error".to_string(),
    })
}

/// First line of every run
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!(version, "🎙️ {} starting", app_name);
}
