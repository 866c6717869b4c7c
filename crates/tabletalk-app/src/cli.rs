//! CLI argument definitions for the tabletalk service.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// tabletalk — answer natural-language questions over an uploaded table.
#[derive(Parser, Debug)]
#[command(name = "tabletalk", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Model API key (or TABLETALK_API_KEY / OPENAI_API_KEY env var).
    #[arg(long = "api-key")]
    pub api_key: Option<String>,

    /// Model provider (currently: openai).
    #[arg(long = "provider")]
    pub provider: Option<String>,

    /// Model name, e.g. gpt-4o-mini.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Model API base URL, for OpenAI-compatible endpoints.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// HTTP listen port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the store, uploads, and session files.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TABLETALK_CONFIG env var > ./tabletalk.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref path) = self.config {
            return path.clone();
        }
        if let Ok(path) = std::env::var("TABLETALK_CONFIG") {
            return PathBuf::from(path);
        }
        PathBuf::from("tabletalk.toml")
    }

    /// Resolve the listen port.
    ///
    /// Priority: --port flag > TABLETALK_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(port) = self.port {
            return port;
        }
        if let Ok(val) = std::env::var("TABLETALK_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                return port;
            }
        }
        config_port
    }

    /// Resolve the model API key.
    ///
    /// Priority: --api-key flag > TABLETALK_API_KEY > OPENAI_API_KEY.
    /// Returns `None` when no credential was supplied at all.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        std::env::var("TABLETALK_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}
