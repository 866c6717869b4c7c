use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the tabletalk service.
///
/// Loaded from a TOML file; every field has a default so a missing or
/// partial file still yields a runnable configuration. The model API key is
/// deliberately not part of this file — it is supplied at process startup
/// via CLI flag or environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabletalkConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chart: ChartConfig,
}

impl TabletalkConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TabletalkConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the uploaded file, the SQLite store, and the
    /// per-session memory files.
    pub data_dir: String,
    /// HTTP listen port.
    pub port: u16,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            port: 8000,
            log_level: "info".to_string(),
        }
    }
}

/// Model provider settings shared by the agent and the chart classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name. Currently "openai" (or any OpenAI-compatible endpoint
    /// via `base_url`).
    pub provider: String,
    /// Model name sent with every completion request.
    pub model: String,
    /// API base URL, e.g. "https://api.openai.com/v1".
    pub base_url: String,
    /// Sampling temperature for the SQL agent.
    pub agent_temperature: f32,
    /// Sampling temperature for the chart classifier. Kept low so the
    /// classifier leans deterministic.
    pub chart_temperature: f32,
    /// Completion token cap per request.
    pub max_tokens: usize,
    /// Upper bound on agent query/execute/observe cycles per question.
    pub max_agent_steps: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            agent_temperature: 0.0,
            chart_temperature: 0.2,
            max_tokens: 1024,
            max_agent_steps: 6,
        }
    }
}

/// Chart suggestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Whether to run the visualization classifier at all. Disabling it
    /// always yields a null chart suggestion.
    pub enabled: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
