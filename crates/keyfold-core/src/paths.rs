//! Standard paths used by keyfold tools

use std::path::PathBuf;

/// Standard keyfold paths
pub struct Paths {
    /// Data directory (~/.local/share/keyfold)
    pub data: PathBuf,
    /// Config directory (~/.config/keyfold)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("keyfold");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("keyfold");

        Self { data, config }
    }

    /// The CLI's durable store, one JSON document
    pub fn store_file(&self) -> PathBuf {
        self.data.join("keys.json")
    }

    /// The sync server's backing file
    pub fn server_store_file(&self) -> PathBuf {
        self.data.join("server").join("keys.json")
    }

    /// The CLI configuration file
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.json")
    }
}
