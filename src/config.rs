//! Player configuration with optional on-disk overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_DIR_NAME: &str = "mplayer-slave";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config: {0}")]
  Io(#[from] std::io::Error),
  #[error("Failed to parse config: {0}")]
  Json(#[from] serde_json::Error),
  #[error("Invalid config: {0}")]
  Invalid(String),
}

/// Player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
  /// Custom MPlayer executable path (None = auto-detect).
  #[serde(default)]
  pub mplayer_path: Option<String>,

  /// Delay before restarting MPlayer after it failed, in seconds.
  #[serde(default = "default_restart_backoff_secs")]
  pub restart_backoff_secs: u64,

  /// How often a playing session asks MPlayer for the loaded path.
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,

  /// A clean exit sooner than this after launch counts as a failure.
  /// Zero disables the check.
  #[serde(default = "default_min_uptime_ms")]
  pub min_uptime_ms: u64,
}

fn default_restart_backoff_secs() -> u64 {
  10
}

fn default_poll_interval_ms() -> u64 {
  1000
}

fn default_min_uptime_ms() -> u64 {
  0
}

impl Default for PlayerConfig {
  fn default() -> Self {
    Self {
      mplayer_path: None,
      restart_backoff_secs: default_restart_backoff_secs(),
      poll_interval_ms: default_poll_interval_ms(),
      min_uptime_ms: default_min_uptime_ms(),
    }
  }
}

impl PlayerConfig {
  /// Default location: `<config dir>/mplayer-slave/config.json`.
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
  }

  /// Load from the default location, falling back to defaults when there is
  /// no config file.
  pub fn load() -> Result<Self, ConfigError> {
    match Self::default_path() {
      Some(path) if path.exists() => Self::load_from(&path),
      _ => {
        log::debug!("No config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
    log::info!("Loading config from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json(&text)
  }

  pub fn from_json(text: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_json::from_str(text)?;
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self
      .mplayer_path
      .as_ref()
      .is_some_and(|p| p.trim().is_empty())
    {
      return Err("MPlayer path cannot be empty".to_string());
    }
    if self.restart_backoff_secs == 0 {
      return Err("Restart backoff must be at least 1 second".to_string());
    }
    if self.poll_interval_ms == 0 {
      return Err("Poll interval must be greater than zero".to_string());
    }
    Ok(())
  }

  pub fn mplayer_path(&self) -> Option<PathBuf> {
    self.mplayer_path.as_ref().map(PathBuf::from)
  }

  pub fn restart_backoff(&self) -> Duration {
    Duration::from_secs(self.restart_backoff_secs)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn min_uptime(&self) -> Duration {
    Duration::from_millis(self.min_uptime_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = PlayerConfig::default();
    assert_eq!(config.restart_backoff(), Duration::from_secs(10));
    assert_eq!(config.poll_interval(), Duration::from_secs(1));
    assert_eq!(config.mplayer_path(), None);
    assert_eq!(config.min_uptime(), Duration::ZERO);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_json_keeps_defaults() {
    let config = PlayerConfig::from_json(r#"{"mplayerPath":"/opt/mplayer","pollIntervalMs":500}"#)
      .unwrap();
    assert_eq!(config.mplayer_path(), Some(PathBuf::from("/opt/mplayer")));
    assert_eq!(config.poll_interval(), Duration::from_millis(500));
    assert_eq!(config.restart_backoff_secs, 10);
    assert_eq!(config.min_uptime_ms, 0);
  }

  #[test]
  fn test_invalid_values_rejected() {
    assert!(matches!(
      PlayerConfig::from_json(r#"{"pollIntervalMs":0}"#),
      Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
      PlayerConfig::from_json(r#"{"mplayerPath":"  "}"#),
      Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
      PlayerConfig::from_json("not json"),
      Err(ConfigError::Json(_))
    ));
  }
}
