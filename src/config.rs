//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::log::LogRedirectionStrategy;
use crate::{AppError, Result};

/// Configurable wait values (milliseconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// How long a media information session waits for output still in
    /// transmit after the probe exits.
    #[serde(default = "default_media_information_millis")]
    pub media_information_millis: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            media_information_millis: default_media_information_millis(),
        }
    }
}

fn default_media_information_millis() -> u64 {
    5000
}

fn default_ffmpeg_binary() -> String {
    "ffmpeg".into()
}

fn default_ffprobe_binary() -> String {
    "ffprobe".into()
}

fn default_worker_threads() -> usize {
    10
}

fn default_session_history_size() -> usize {
    10
}

fn default_pipe_directory() -> PathBuf {
    std::env::temp_dir().join("session-bridge").join("pipes")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Binary run for plain sessions.
    #[serde(default = "default_ffmpeg_binary")]
    pub ffmpeg_binary: String,
    /// Binary run for probe and media information sessions.
    #[serde(default = "default_ffprobe_binary")]
    pub ffprobe_binary: String,
    /// Number of worker lanes that run sessions concurrently.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Maximum number of sessions kept in history.
    #[serde(default = "default_session_history_size")]
    pub session_history_size: usize,
    /// Redirection policy applied to sessions created through the bridge.
    #[serde(default)]
    pub log_redirection_strategy: LogRedirectionStrategy,
    /// Directory where named pipes are created.
    #[serde(default = "default_pipe_directory")]
    pub pipe_directory: PathBuf,
    /// Wait configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: default_ffmpeg_binary(),
            ffprobe_binary: default_ffprobe_binary(),
            worker_threads: default_worker_threads(),
            session_history_size: default_session_history_size(),
            log_redirection_strategy: LogRedirectionStrategy::default(),
            pipe_directory: default_pipe_directory(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Media information wait as a `Duration`.
    #[must_use]
    pub fn media_information_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.media_information_millis)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(AppError::Config(
                "worker_threads must be greater than zero".into(),
            ));
        }

        if self.session_history_size == 0 {
            return Err(AppError::Config(
                "session_history_size must be greater than zero".into(),
            ));
        }

        if self.ffmpeg_binary.trim().is_empty() || self.ffprobe_binary.trim().is_empty() {
            return Err(AppError::Config("binary names must not be empty".into()));
        }

        Ok(())
    }
}
