//! Single-file document store behind the sync endpoint

use anyhow::{Context, Result};
use keyfold_core::model::Root;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// One JSON document on disk, created lazily with the canonical empty Root
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document, creating it first when absent. Never overwrites
    /// an existing file.
    pub fn read(&self) -> Result<Value> {
        self.ensure_exists()?;
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    /// Overwrite the document with an already-validated root
    pub fn write(&self, root: &Root) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(root).context("failed to serialize document")?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.write(&Root::canonical_default())
    }
}
