//! JSON file config adapter.
//!
//! Implements [`ConfigPort`] on a single pretty-printed JSON document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::ConsoleConfig;

pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load, or fall back to defaults if the file does not exist.
    /// Any other failure is returned.
    pub fn load_or_default(&self) -> Result<ConsoleConfig, ConfigError> {
        match self.load() {
            Err(ConfigError::NotFound) => {
                info!("no config at {}, using defaults", self.path.display());
                Ok(ConsoleConfig::default())
            }
            other => other,
        }
    }
}

impl ConfigPort for JsonFileConfig {
    fn load(&self) -> Result<ConsoleConfig, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::IoError,
        })?;
        ConsoleConfig::from_json(&text).inspect_err(|e| {
            warn!("config {} rejected: {}", self.path.display(), e);
        })
    }

    fn save(&self, config: &ConsoleConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let text = serde_json::to_string_pretty(config).map_err(|_| ConfigError::Corrupted)?;
        std::fs::write(&self.path, text).map_err(|_| ConfigError::IoError)
    }
}
