//! Sync client for the keyfold-server endpoint
//!
//! Mirrors the whole root document: a pull on startup replaces local state
//! (last-pull-wins, no merge), a push after each mutation overwrites the
//! remote file unconditionally. Both are best-effort; the local store is
//! always the fallback and a failed push is abandoned because the local
//! mutation already committed.

use anyhow::{bail, Context, Result};
use keyfold_core::model::{self, Root};
use tracing::{debug, warn};

use crate::config::Config;

/// Client for the single-document sync endpoint
pub struct SyncClient {
    client: reqwest::Client,
    endpoint: String,
    enabled: bool,
}

impl SyncClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/sync", config.sync_url.trim_end_matches('/')),
            enabled: config.sync_enabled,
        }
    }

    /// Whether remote interaction is configured at all
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Best-effort pull. `None` when sync is disabled or the remote is
    /// unreachable or invalid; the caller keeps its local state.
    pub async fn pull(&self) -> Option<Root> {
        if !self.enabled {
            return None;
        }
        match self.try_pull().await {
            Ok(root) => {
                debug!("pulled document from {}", self.endpoint);
                Some(root)
            }
            Err(e) => {
                warn!("sync pull failed: {e:#}; using local store");
                None
            }
        }
    }

    /// Pull the remote document, failing loudly on any problem
    pub async fn try_pull(&self) -> Result<Root> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.endpoint))?;
        if !response.status().is_success() {
            bail!("server returned {}", response.status());
        }
        let value: serde_json::Value = response
            .json()
            .await
            .context("response body is not JSON")?;
        let root = model::validate_root(&value).context("remote document failed validation")?;
        Ok(root)
    }

    /// Best-effort push; failures are logged and swallowed
    pub async fn push(&self, root: &Root) {
        if !self.enabled {
            return;
        }
        match self.try_push(root).await {
            Ok(()) => debug!("pushed document to {}", self.endpoint),
            Err(e) => warn!("sync push failed: {e:#}"),
        }
    }

    /// Overwrite the remote document, failing loudly on any problem
    pub async fn try_push(&self, root: &Root) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(root)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?;
        if !response.status().is_success() {
            bail!("server returned {}", response.status());
        }
        Ok(())
    }
}
