//! aibridge: answers SIP calls on one extension and lets an AI assistant
//! talk to the caller.

mod events;
mod recorder;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use aibridge_infra_common::{
    BridgeConfig, LoggingConfig, load_env_file, log_welcome, parse_log_level, setup_logging,
};
use aibridge_session_core::prelude::*;
use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::LogEvents;

#[derive(Parser, Debug)]
#[command(name = "aibridge", version)]
#[command(about = "SIP to AI voice gateway")]
struct Args {
    /// Environment file to load; defaults to a .env in the working directory
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// SIP listening port (overrides SIP_PORT)
    #[arg(long)]
    sip_port: Option<u16>,

    /// Extension to answer (overrides SIP_EXTENSION)
    #[arg(long)]
    extension: Option<String>,
}

impl Args {
    fn apply(&self, bridge: &mut BridgeConfig) {
        if let Some(port) = self.sip_port {
            bridge.sip_port = port;
        }
        if let Some(extension) = &self.extension {
            bridge.extension = extension.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Loaded before logging so that RUST_LOG from the file applies
    let env_file = load_env_file(args.env_file.as_deref())?;

    let level = parse_log_level(&args.log_level)?;
    setup_logging(LoggingConfig::new(level, "aibridge").with_json(args.json_logs))?;
    log_welcome("aibridge", env!("CARGO_PKG_VERSION"));
    if let Some(path) = env_file {
        info!(path = %path.display(), "Environment file loaded");
    }

    let mut bridge = BridgeConfig::from_env().context("reading configuration")?;
    args.apply(&mut bridge);

    let config = settings::session_config(&bridge);
    let services = settings::build_services(&bridge, &config.pipeline).await?;

    let events = EventBus::default();
    let _log_task = events.register_handler(Arc::new(LogEvents));

    let engine = SignalingEngine::bind(config, services, events)
        .await
        .context("starting SIP listener")?;
    info!(
        "🚀 Answering extension {} on {}",
        bridge.extension,
        engine.local_addr()
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                trigger.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    engine.run(shutdown).await?;
    info!("Goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_environment() {
        let args = Args::parse_from(["aibridge", "--sip-port", "5080", "--extension", "7000"]);
        let mut bridge = BridgeConfig::default();
        args.apply(&mut bridge);
        assert_eq!(bridge.sip_port, 5080);
        assert_eq!(bridge.extension, "7000");
    }

    #[test]
    fn test_defaults_leave_environment_alone() {
        let args = Args::parse_from(["aibridge", "--json-logs"]);
        assert!(args.json_logs);
        let mut bridge = BridgeConfig::default();
        args.apply(&mut bridge);
        assert_eq!(bridge, BridgeConfig::default());
    }
}
