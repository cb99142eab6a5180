//! Configuration loading from courier.toml.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Model endpoint configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Session behavior.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Model endpoint configuration.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Model to use.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the Ollama endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
        }
    }
}

/// Session behavior configuration.
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Bound on tool rounds per query (one follow-up completion per round).
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Override for the tool-usage system prompt.
    pub system_prompt: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            system_prompt: None,
        }
    }
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_max_tool_rounds() -> usize {
    1
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
