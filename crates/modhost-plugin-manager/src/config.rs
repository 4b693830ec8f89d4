//! Manager configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManagerError;

/// Default metadata file suffix.
pub const DEFAULT_METADATA_SUFFIX: &str = ".conf";

/// Configuration of one [`Manager`](crate::Manager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Interface tag plugins must report.
    pub interface: String,
    /// Directory scanned for plugin modules.
    pub plugin_directory: PathBuf,
    /// File name suffix of plugin modules.
    pub module_suffix: String,
    /// File name suffix of plugin metadata files.
    pub metadata_suffix: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            plugin_directory: PathBuf::new(),
            module_suffix: std::env::consts::DLL_SUFFIX.to_string(),
            metadata_suffix: DEFAULT_METADATA_SUFFIX.to_string(),
        }
    }
}

impl ManagerConfig {
    /// Configuration for `interface` scanning `plugin_directory`.
    pub fn new(interface: impl Into<String>, plugin_directory: impl Into<PathBuf>) -> Self {
        Self {
            interface: interface.into(),
            plugin_directory: plugin_directory.into(),
            ..Self::default()
        }
    }

    /// Use another module file suffix.
    pub fn with_module_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.module_suffix = suffix.into();
        self
    }

    /// Use another metadata file suffix.
    pub fn with_metadata_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.metadata_suffix = suffix.into();
        self
    }

    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ManagerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ManagerError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Path of the module file of `plugin`.
    pub fn module_path(&self, plugin: &str) -> PathBuf {
        self.plugin_directory
            .join(format!("{plugin}{}", self.module_suffix))
    }

    /// Path of the metadata file of `plugin`.
    pub fn metadata_path(&self, plugin: &str) -> PathBuf {
        self.plugin_directory
            .join(format!("{plugin}{}", self.metadata_suffix))
    }
}
