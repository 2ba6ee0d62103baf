// SPDX-License-Identifier: MIT

//! Runtime configuration: defaults, TOML loading, and the write-if-missing
//! behavior the daemon relies on at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// What the scene processor should do when the image server is
/// unreachable at the start of a rendering cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Abort the job; it will be retried on the next reconciliation pass.
    Skip,
    /// Write only the prompt text alongside the metadata and mark the
    /// scene completed, with no image.
    PromptOnly,
    /// Write a placeholder image and mark the scene completed anyway.
    Mock,
}

impl Default for FallbackMode {
    fn default() -> Self {
        FallbackMode::Skip
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageServerConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ImageServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7860,
            connect_timeout_secs: 5,
            request_timeout_secs: 300,
            max_retries: 3,
            retry_delay_secs: 10,
        }
    }
}

impl ImageServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub deadline_secs: u64,
    pub chat_retry_count: u32,
    pub chat_retry_backoff_secs: u64,
    pub temperature: f64,
    pub top_p: f64,
    pub num_predict: i64,
    pub num_ctx: i64,
    /// Shell script that starts the LLM host, run as `bash <launch_command>`.
    /// `None` means the host is assumed to already be running and the
    /// Service Supervisor only health-probes it, never spawns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_command: Option<String>,
    /// How often to re-poll `/api/version` while waiting out the startup
    /// window.
    pub startup_poll_interval_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3".to_string(),
            deadline_secs: 120,
            chat_retry_count: 3,
            chat_retry_backoff_secs: 5,
            temperature: 0.7,
            top_p: 0.9,
            num_predict: 1500,
            num_ctx: 4096,
            launch_command: None,
            startup_poll_interval_secs: 2,
        }
    }
}

impl LlmConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn chat_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.chat_retry_backoff_secs)
    }

    pub fn startup_poll_interval(&self) -> Duration {
        Duration::from_secs(self.startup_poll_interval_secs)
    }
}

/// Rotating-file-handler limits for the daemon's log sinks, mirroring the
/// original's `logging.handlers.RotatingFileHandler` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub level: String,
    pub max_size_mb: u64,
    pub backup_count: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            level: "info".to_string(),
            max_size_mb: 10,
            backup_count: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory watched for `*_transkript.txt` files.
    pub watched_dir: PathBuf,
    /// Directory scene artifacts (`_metadata.json`/`_image.png`/`_error.json`)
    /// are written to.
    pub output_dir: PathBuf,
    pub reconciliation_interval_secs: u64,
    pub healthcheck_interval_secs: u64,
    pub startup_window_secs: u64,
    pub shutdown_grace_secs: u64,
    pub fallback_mode: FallbackMode,
    pub image_server: ImageServerConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watched_dir: PathBuf::from("transkripte"),
            output_dir: PathBuf::from("scene"),
            reconciliation_interval_secs: 3,
            healthcheck_interval_secs: 30,
            startup_window_secs: 30,
            shutdown_grace_secs: 10,
            fallback_mode: FallbackMode::default(),
            image_server: ImageServerConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn reconciliation_interval(&self) -> Duration {
        Duration::from_secs(self.reconciliation_interval_secs)
    }

    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_secs(self.healthcheck_interval_secs)
    }

    pub fn startup_window(&self) -> Duration {
        Duration::from_secs(self.startup_window_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Load config from `path`, writing out the defaults if the file does
    /// not exist yet. Unknown keys are ignored by `toml`'s default
    /// deserialization behavior; missing required keys fall back to
    /// `#[serde(default)]` per-field, so a partially-written config file
    /// never fails to load.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let config = Config::default();
                config.write_to(path)?;
                Ok(config)
            }
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        let rendered = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.display().to_string(),
                source,
            })?;
        }
        std::fs::write(path, rendered).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
