//! Client configuration loaded from TOML or JSON files.

use crate::error::{Result, TaskError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Settings shared by the operation poller, the zone clients and the clone
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Task engine address.
    pub endpoint: String,
    /// Interval between operation polls.
    pub operation_poll_period_ms: u64,
    /// Consecutive aborted clone attempts before giving up.
    pub max_consecutive_retries: u32,
    /// Log output format.
    pub log_format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("localhost:9797"),
            operation_poll_period_ms: 1000,
            max_consecutive_retries: 3,
            log_format: LogFormat::Text,
            log_filter: String::from("info"),
        }
    }
}

impl ClientConfig {
    /// Loads and validates a `.toml` or `.json` config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: ClientConfig = match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no client can run with.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(TaskError::non_retriable(
                "malformed configuration: endpoint is empty",
            ));
        }
        if self.operation_poll_period_ms == 0 {
            return Err(TaskError::non_retriable(
                "malformed configuration: operation_poll_period_ms must be positive",
            ));
        }
        if self.max_consecutive_retries == 0 {
            return Err(TaskError::non_retriable(
                "malformed configuration: max_consecutive_retries must be positive",
            ));
        }
        Ok(())
    }

    /// Poll interval as a `Duration`.
    pub fn operation_poll_period(&self) -> Duration {
        Duration::from_millis(self.operation_poll_period_ms)
    }
}
