//! Profile configuration

use sandgate_privacy_sandbox::{Feature, FeatureList};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the preferences database. `None` keeps preferences in memory.
    pub database_path: Option<PathBuf>,
    /// Incognito profiles never persist preferences
    pub incognito: bool,
    /// Set when the account is not allowed to use Privacy Sandbox
    pub privacy_sandbox_restricted: bool,
    /// Clear cookies when the profile shuts down
    pub cookies_clear_on_exit: bool,
    pub enabled_features: Vec<Feature>,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: Some(data_dir.join("sandgate.db")),
            incognito: false,
            privacy_sandbox_restricted: false,
            cookies_clear_on_exit: false,
            enabled_features: Vec::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            database_path: None,
            ..Self::new(PathBuf::new())
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Sandgate"))
            .unwrap_or_else(|| PathBuf::from(".sandgate"))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(CoreError::Config("database_path is empty".to_string()));
            }
            if path.is_dir() {
                return Err(CoreError::Config(format!(
                    "database_path {} is a directory",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    pub fn feature_list(&self) -> FeatureList {
        FeatureList::with_features(self.enabled_features.iter().copied())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}
