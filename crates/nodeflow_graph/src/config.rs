// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph and registry settings.
//!
//! Settings are plain serde structs; missing fields fall back to their
//! defaults so older settings files keep loading.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Behavior switches for a [`Graph`](crate::Graph)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Connecting onto an occupied single-connection input evicts the old
    /// connection. When `false` the attempt fails with `PortNotEmpty`.
    pub replace_occupied_input: bool,
    /// Refuse connections that would close a cycle
    pub check_cycles: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            replace_occupied_input: true,
            check_cycles: true,
        }
    }
}

/// Behavior switches for a [`DataTypeRegistry`](crate::DataTypeRegistry)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Registering an existing key replaces it instead of failing
    pub allow_overwrite: bool,
}

/// Combined settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graph behavior
    pub graph: GraphSettings,
    /// Registry behavior
    pub registry: RegistrySettings,
}

impl Settings {
    /// Serialize to RON format
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON format
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = self.to_ron().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.graph.replace_occupied_input);
        assert!(settings.graph.check_cycles);
        assert!(!settings.registry.allow_overwrite);
    }

    #[test]
    fn test_serialization() {
        let mut settings = Settings::default();
        settings.graph.replace_occupied_input = false;
        settings.registry.allow_overwrite = true;

        let ron_str = settings.to_ron().unwrap();
        let loaded = Settings::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded = Settings::from_ron("(graph: (check_cycles: false))").unwrap();
        assert!(!loaded.graph.check_cycles);
        assert!(loaded.graph.replace_occupied_input);
        assert_eq!(loaded.registry, RegistrySettings::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("nodeflow-settings-{}.ron", uuid::Uuid::new_v4()));
        let mut settings = Settings::default();
        settings.graph.check_cycles = false;

        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, settings);
    }
}
