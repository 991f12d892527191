//! Configuration for the keyfold CLI

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// CLI configuration, stored at ~/.config/keyfold/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Mirror every change to the sync server
    #[serde(default)]
    pub sync_enabled: bool,

    /// Base URL of the sync server
    #[serde(default = "default_sync_url")]
    pub sync_url: String,
}

fn default_sync_url() -> String {
    "http://localhost:5000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_enabled: false,
            sync_url: default_sync_url(),
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply KEYFOLD_SYNC / KEYFOLD_SYNC_URL environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("KEYFOLD_SYNC") {
            self.sync_enabled = matches!(value.as_str(), "1" | "true" | "on");
        }
        if let Ok(url) = std::env::var("KEYFOLD_SYNC_URL") {
            if !url.is_empty() {
                self.sync_url = url;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.sync_enabled);
        assert_eq!(config.sync_url, "http://localhost:5000");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert!(!config.sync_enabled);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            sync_enabled: true,
            sync_url: "http://example.test:9999".to_string(),
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(loaded.sync_enabled);
        assert_eq!(loaded.sync_url, "http://example.test:9999");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"syncEnabled": true}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(loaded.sync_enabled);
        assert_eq!(loaded.sync_url, "http://localhost:5000");
    }
}
