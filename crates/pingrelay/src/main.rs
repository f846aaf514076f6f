//! # pingrelay
//!
//! Relay server binary: resolves configuration, installs logging and
//! metrics, then serves `/ws` until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pingrelay_server::config::{ServerConfig, load_config};
use pingrelay_server::server::RelayServer;

/// Session relay with latency and clock-offset tracking.
#[derive(Parser, Debug)]
#[command(name = "pingrelay", about = "WebSocket session relay with ping latency tracking")]
struct Cli {
    /// Host to bind (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter when `RUST_LOG` is unset (overrides config).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit one JSON object per log line.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Layer CLI flags over the loaded config.
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if args.log_json {
        pingrelay_core::logging::init_json_subscriber(&config.log_level);
    } else {
        pingrelay_core::logging::init_subscriber(&config.log_level);
    }

    let metrics = match pingrelay_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let server = RelayServer::new(config, metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;

    let tags = server.relay().tags();
    tracing::info!(
        message_tag = %tags.message,
        ping_tag = %tags.ping,
        ping_reply_tag = %tags.ping_reply,
        relay_messages = server.config().relay_messages,
        "pingrelay listening on ws://{addr}/ws"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    // The serve task drains sessions within `drain_timeout_secs`.
    server.shutdown().graceful_shutdown(vec![handle], None).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cli_defaults_leave_config_alone() {
        let cli = Cli::parse_from(["pingrelay"]);
        let mut config = ServerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 3550);
        assert!(!cli.log_json);
    }

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::parse_from([
            "pingrelay",
            "--host",
            "127.0.0.1",
            "--port",
            "0",
            "--log-level",
            "debug",
        ]);
        let mut config = ServerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn cli_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pingrelay.json");
        std::fs::write(&path, r#"{"port": 4000, "relay_messages": false}"#).unwrap();
        let cli = Cli::parse_from(["pingrelay", "--config", path.to_str().unwrap()]);
        let config = load_config(cli.config.as_deref()).unwrap();
        assert_eq!(config.port, 4000);
        assert!(!config.relay_messages);
    }

    #[tokio::test]
    async fn server_graceful_shutdown() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        let server = RelayServer::new(config, None);
        let (_, handle) = server.listen().await.unwrap();

        server.shutdown().shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("shutdown timed out")
            .expect("join error");
    }
}
