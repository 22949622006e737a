//! Configuration loading for the chat server.
//!
//! Precedence, lowest to highest: built-in defaults, TOML file, CLI
//! arguments. A missing file falls back to defaults; a present-but-broken
//! file is an error rather than a silent fallback.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use relayd::ServerConfig;

pub const DEFAULT_PORT: u16 = 3691;

/// Command-line interface for the chat server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Path to configuration file (TOML, relayd::ServerConfig schema)
    #[arg(long, short = 'c', default_value = "chat-server.toml")]
    pub config: String,

    /// Host address to bind to (overrides config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides config file)
    #[arg(long)]
    pub port: Option<u16>,

    /// Strategy code to advertise: 0 = plaintext, 1 = XOR (overrides
    /// config file)
    #[arg(long)]
    pub strategy: Option<u32>,
}

/// Load the server configuration with file and CLI layering applied.
pub fn load_server_config(args: &ServerArgs) -> Result<ServerConfig> {
    let mut config = load_config_file(&args.config)?;

    if let Some(ref host) = args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(strategy) = args.strategy {
        config.strategy_code = strategy;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration validation failed: {e}"))?;

    Ok(config)
}

fn load_config_file(path: &str) -> Result<ServerConfig> {
    if !Path::new(path).exists() {
        tracing::debug!(config_path = %path, "configuration file not found, using defaults");
        return Ok(ServerConfig {
            port: DEFAULT_PORT,
            ..ServerConfig::default()
        });
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path}"))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse TOML config {path}"))
}
