//! Engine settings
//!
//! Stored as TOML under `~/.config/joycursor/engine.toml`. Missing keys take
//! their defaults, and a missing file is written out with defaults on first
//! start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::DriverSettings;
use crate::persistence::StorePaths;

const CONFIG_DIR: &str = ".config/joycursor";
const SETTINGS_FILE: &str = "engine.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Where actions go
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Virtual mouse/keyboard via uinput
    #[default]
    Uinput,
    /// Log actions only
    Log,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub poll_interval_ms: u64,
    pub max_dt_secs: f32,
    pub default_dt_secs: f32,
    pub trigger_scroll_interval_ms: u64,
    pub mappings_path: PathBuf,
    pub controllers_path: PathBuf,
    pub sink: SinkKind,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let paths = StorePaths::in_dir(&config_dir());
        Self {
            poll_interval_ms: 5,
            max_dt_secs: 0.1,
            default_dt_secs: 0.005,
            trigger_scroll_interval_ms: 10,
            mappings_path: paths.mappings,
            controllers_path: paths.controllers,
            sink: SinkKind::Uinput,
        }
    }
}

impl EngineSettings {
    pub fn default_path() -> PathBuf {
        config_dir().join(SETTINGS_FILE)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths {
            mappings: self.mappings_path.clone(),
            controllers: self.controllers_path.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !(self.default_dt_secs > 0.0 && self.default_dt_secs <= self.max_dt_secs) {
            return Err(ConfigError::Invalid(format!(
                "default_dt_secs ({}) must be in (0, max_dt_secs = {}]",
                self.default_dt_secs, self.max_dt_secs
            )));
        }
        Ok(())
    }

    /// Load settings from `path`, writing defaults there if it does not exist
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if !exists {
            info!("No settings at {}, writing defaults", path.display());
            let settings = Self::default();
            settings.save(path).await?;
            return Ok(settings);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let settings: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;

        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await.map_err(io_error)
    }
}

impl From<&EngineSettings> for DriverSettings {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            max_dt: settings.max_dt_secs,
            default_dt: settings.default_dt_secs,
            trigger_scroll_interval: Duration::from_millis(settings.trigger_scroll_interval_ms),
        }
    }
}

fn config_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    });
    home.join(CONFIG_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: EngineSettings =
            toml::from_str("poll_interval_ms = 8\nsink = \"log\"\n").unwrap();
        assert_eq!(settings.poll_interval_ms, 8);
        assert_eq!(settings.sink, SinkKind::Log);
        assert_eq!(settings.trigger_scroll_interval_ms, 10);
        assert_eq!(settings.max_dt_secs, 0.1);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let settings = EngineSettings {
            poll_interval_ms: 0,
            ..EngineSettings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
        assert!(EngineSettings::default().validate().is_ok());
    }

    #[test]
    fn test_driver_settings_conversion() {
        let driver = DriverSettings::from(&EngineSettings::default());
        assert_eq!(driver, DriverSettings::default());
    }

    #[tokio::test]
    async fn test_load_or_create_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let created = EngineSettings::load_or_create(&path).await.unwrap();
        assert!(path.exists());

        let loaded = EngineSettings::load_or_create(&path).await.unwrap();
        assert_eq!(created, loaded);
    }

    #[tokio::test]
    async fn test_load_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        tokio::fs::write(&path, "poll_interval_ms = \"fast\"").await.unwrap();

        let result = EngineSettings::load_or_create(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
