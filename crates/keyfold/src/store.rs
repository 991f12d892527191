//! The local secrets store
//!
//! An explicitly owned, single-writer state container over one JSON
//! document. Every mutating operation rewrites the whole document
//! (write-through, no batching); policy refusals such as deleting the last
//! profile or naming an unknown id are silent no-ops. After any sequence of
//! operations `current_profile_id` references an existing profile and the
//! selected folder either exists in the current profile or equals the
//! `"default"` placeholder.

use anyhow::{Context, Result};
use chrono::Utc;
use keyfold_core::migrate::migrate;
use keyfold_core::model::{Folder, Profile, Root, Secret, DEFAULT_ID};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Fields for a new secret; id and timestamps are stamped by the store
#[derive(Debug, Clone, Default)]
pub struct SecretDraft {
    pub name: String,
    pub value: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

/// Partial update for an existing secret; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct SecretPatch {
    pub name: Option<String>,
    pub value: Option<String>,
    pub tags: Option<Vec<String>>,
    pub description: Option<String>,
}

/// The local store: the root document plus session selection state
pub struct Store {
    root: Root,
    path: PathBuf,
    selected_folder_id: String,
    search_term: String,
    selected_tags: Vec<String>,
}

impl Store {
    /// Load the store from the durable document at `path`
    ///
    /// An absent file is created with the canonical empty Root; a present
    /// one is migrated and its selection pointers healed. Never fails
    /// outward: an unreadable or corrupt document is replaced with the
    /// canonical empty Root and a diagnostic is logged.
    pub fn load(path: &Path) -> Self {
        let root = match Self::read_document(path) {
            Ok(Some(root)) => root,
            Ok(None) => {
                let root = Root::canonical_default();
                if let Err(e) = write_document(path, &root) {
                    warn!("failed to write initial store {}: {e:#}", path.display());
                }
                root
            }
            Err(e) => {
                warn!(
                    "failed to load store {}: {e:#}; starting from an empty document",
                    path.display()
                );
                Root::canonical_default()
            }
        };

        let mut store = Self {
            root,
            path: path.to_path_buf(),
            selected_folder_id: DEFAULT_ID.to_string(),
            search_term: String::new(),
            selected_tags: Vec::new(),
        };
        store.heal_selection();
        store
    }

    fn read_document(path: &Path) -> Result<Option<Root>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(migrate(&value)))
    }

    /// The full root document
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Path of the durable document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The active profile. Always present after healing.
    pub fn current_profile(&self) -> Option<&Profile> {
        self.root.current_profile()
    }

    pub fn selected_folder_id(&self) -> &str {
        &self.selected_folder_id
    }

    /// Replace the whole root document (sync pull, full-root import)
    pub fn replace_root(&mut self, mut root: Root) -> Result<()> {
        root.normalize_current();
        self.root = root;
        self.heal_selection();
        self.persist()
    }

    /// Append an imported profile; adopt it as current only when no current
    /// profile was set before
    pub fn append_profile(&mut self, profile: Profile) -> Result<()> {
        let id = profile.id.clone();
        self.root.profiles.push(profile);
        if self.root.current_profile_id.is_empty() {
            self.root.current_profile_id = id;
            self.heal_selection();
        }
        self.persist()
    }

    // Selection and filter state is session-only, never persisted.

    pub fn set_selected_folder(&mut self, folder_id: &str) {
        self.selected_folder_id = folder_id.to_string();
    }

    pub fn set_search_term(&mut self, term: &str) {
        self.search_term = term.to_string();
    }

    pub fn set_selected_tags(&mut self, tags: Vec<String>) {
        self.selected_tags = tags;
    }

    /// Add a profile with one empty "default" folder; returns its id
    pub fn add_profile(&mut self, name: &str) -> Result<String> {
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            folders: vec![Folder::new(&Uuid::new_v4().to_string(), "default")],
            created_at: now,
            updated_at: now,
        };
        let id = profile.id.clone();
        self.root.profiles.push(profile);
        self.persist()?;
        Ok(id)
    }

    pub fn rename_profile(&mut self, id: &str, name: &str) -> Result<()> {
        if let Some(profile) = self.root.profile_mut(id) {
            profile.name = name.to_string();
            profile.updated_at = Utc::now();
            self.persist()?;
        }
        Ok(())
    }

    /// Delete a profile. Refuses (no-op) when it is the last one; deleting
    /// the current profile switches to the first remaining profile.
    pub fn delete_profile(&mut self, id: &str) -> Result<()> {
        if self.root.profiles.len() <= 1 {
            return Ok(());
        }
        let Some(pos) = self.root.profiles.iter().position(|p| p.id == id) else {
            return Ok(());
        };
        self.root.profiles.remove(pos);
        if self.root.current_profile_id == id {
            let first = &self.root.profiles[0];
            self.root.current_profile_id = first.id.clone();
            self.selected_folder_id = first.first_folder_id();
        }
        self.persist()
    }

    /// Switch the active profile and reselect its first folder
    pub fn set_current_profile(&mut self, id: &str) -> Result<()> {
        let Some(profile) = self.root.profile(id) else {
            return Ok(());
        };
        self.selected_folder_id = profile.first_folder_id();
        self.root.current_profile_id = id.to_string();
        self.persist()
    }

    /// Add a folder to the current profile; returns its id
    pub fn add_folder(&mut self, name: &str) -> Result<String> {
        let folder = Folder::new(&Uuid::new_v4().to_string(), name);
        let id = folder.id.clone();
        let now = Utc::now();
        if let Some(profile) = self.root.current_profile_mut() {
            profile.folders.push(folder);
            profile.updated_at = now;
        }
        self.persist()?;
        Ok(id)
    }

    pub fn rename_folder(&mut self, id: &str, name: &str) -> Result<()> {
        let now = Utc::now();
        if let Some(profile) = self.root.current_profile_mut() {
            if let Some(folder) = profile.folder_mut(id) {
                folder.name = name.to_string();
                profile.updated_at = now;
                self.persist()?;
            }
        }
        Ok(())
    }

    /// Delete a folder; deleting the selected folder reselects the current
    /// profile's first remaining folder (or the "default" placeholder)
    pub fn delete_folder(&mut self, id: &str) -> Result<()> {
        let now = Utc::now();
        let mut reselect = None;
        if let Some(profile) = self.root.current_profile_mut() {
            let before = profile.folders.len();
            profile.folders.retain(|f| f.id != id);
            if profile.folders.len() == before {
                return Ok(());
            }
            profile.updated_at = now;
            reselect = Some(profile.first_folder_id());
        }
        if self.selected_folder_id == id {
            if let Some(first) = reselect {
                self.selected_folder_id = first;
            }
        }
        self.persist()
    }

    /// Add a secret to a folder, stamping id and equal timestamps; returns
    /// the new id
    pub fn add_secret(&mut self, folder_id: &str, draft: SecretDraft) -> Result<String> {
        let now = Utc::now();
        let secret = Secret {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            value: draft.value,
            tags: draft.tags,
            description: Some(draft.description.unwrap_or_default()),
            created_at: now,
            updated_at: now,
        };
        let id = secret.id.clone();
        if let Some(profile) = self.root.current_profile_mut() {
            if let Some(folder) = profile.folder_mut(folder_id) {
                folder.secrets.push(secret);
                profile.updated_at = now;
            }
        }
        self.persist()?;
        Ok(id)
    }

    /// Merge the supplied fields over an existing secret; untouched fields
    /// are retained, `updated_at` is stamped fresh
    pub fn update_secret(&mut self, folder_id: &str, id: &str, patch: SecretPatch) -> Result<()> {
        let now = Utc::now();
        if let Some(profile) = self.root.current_profile_mut() {
            if let Some(secret) = profile
                .folder_mut(folder_id)
                .and_then(|f| f.secrets.iter_mut().find(|s| s.id == id))
            {
                if let Some(name) = patch.name {
                    secret.name = name;
                }
                if let Some(value) = patch.value {
                    secret.value = value;
                }
                if let Some(tags) = patch.tags {
                    secret.tags = tags;
                }
                if let Some(description) = patch.description {
                    secret.description = Some(description);
                }
                secret.updated_at = now;
                profile.updated_at = now;
                self.persist()?;
            }
        }
        Ok(())
    }

    pub fn delete_secret(&mut self, folder_id: &str, id: &str) -> Result<()> {
        let now = Utc::now();
        if let Some(profile) = self.root.current_profile_mut() {
            if let Some(folder) = profile.folder_mut(folder_id) {
                let before = folder.secrets.len();
                folder.secrets.retain(|s| s.id != id);
                if folder.secrets.len() != before {
                    profile.updated_at = now;
                    self.persist()?;
                }
            }
        }
        Ok(())
    }

    /// Secrets of the selected folder, narrowed by the search term
    /// (case-insensitive substring over name, value, and description) and
    /// the selected tags (every tag must be present)
    pub fn filtered_secrets(&self) -> Vec<&Secret> {
        let Some(profile) = self.root.current_profile() else {
            return Vec::new();
        };
        let Some(folder) = profile.folder(&self.selected_folder_id) else {
            return Vec::new();
        };

        let term = self.search_term.to_lowercase();
        folder
            .secrets
            .iter()
            .filter(|secret| {
                let matches_term = term.is_empty()
                    || secret.name.to_lowercase().contains(&term)
                    || secret.value.to_lowercase().contains(&term)
                    || secret
                        .description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&term));

                let matches_tags = self
                    .selected_tags
                    .iter()
                    .all(|tag| secret.tags.contains(tag));

                matches_term && matches_tags
            })
            .collect()
    }

    /// Sorted, deduplicated tags across every folder of the current profile
    pub fn all_tags(&self) -> Vec<String> {
        let Some(profile) = self.root.current_profile() else {
            return Vec::new();
        };
        let tags: BTreeSet<&str> = profile
            .folders
            .iter()
            .flat_map(|f| f.secrets.iter())
            .flat_map(|s| s.tags.iter())
            .map(String::as_str)
            .collect();
        tags.into_iter().map(String::from).collect()
    }

    fn heal_selection(&mut self) {
        self.root.normalize_current();
        if let Some(profile) = self.root.current_profile() {
            if profile.folder(&self.selected_folder_id).is_none() {
                self.selected_folder_id = profile.first_folder_id();
            }
        }
    }

    fn persist(&self) -> Result<()> {
        write_document(&self.path, &self.root)
    }
}

fn write_document(path: &Path, root: &Root) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(root).context("failed to serialize store")?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (Store, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(&dir.path().join("keys.json"));
        (store, dir)
    }

    fn draft(name: &str, value: &str, tags: &[&str]) -> SecretDraft {
        SecretDraft {
            name: name.to_string(),
            value: value.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            description: None,
        }
    }

    #[test]
    fn test_load_creates_default_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let store = Store::load(&path);

        assert!(path.exists());
        assert_eq!(store.root().current_profile_id, DEFAULT_ID);
        assert_eq!(store.selected_folder_id(), DEFAULT_ID);
    }

    #[test]
    fn test_load_corrupt_document_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, "{ not json").unwrap();

        let store = Store::load(&path);
        assert_eq!(store.root().current_profile_id, DEFAULT_ID);
        assert_eq!(store.root().profiles.len(), 1);
    }

    #[test]
    fn test_mutations_are_write_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        let mut store = Store::load(&path);
        store.add_secret(DEFAULT_ID, draft("token", "abc", &[])).unwrap();

        // A fresh load sees the mutation
        let reloaded = Store::load(&path);
        assert_eq!(reloaded.filtered_secrets().len(), 1);
        assert_eq!(reloaded.filtered_secrets()[0].name, "token");
    }

    #[test]
    fn test_add_secret_stamps_equal_timestamps() {
        let (mut store, _dir) = temp_store();
        let id = store.add_secret(DEFAULT_ID, draft("token", "abc", &[])).unwrap();

        let secrets = store.filtered_secrets();
        assert_eq!(secrets[0].id, id);
        assert_eq!(secrets[0].created_at, secrets[0].updated_at);
        assert_eq!(secrets[0].description.as_deref(), Some(""));
    }

    #[test]
    fn test_update_secret_merges_partial() {
        let (mut store, _dir) = temp_store();
        let id = store
            .add_secret(DEFAULT_ID, draft("token", "abc", &["ci"]))
            .unwrap();

        store
            .update_secret(
                DEFAULT_ID,
                &id,
                SecretPatch {
                    value: Some("xyz".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let secrets = store.filtered_secrets();
        assert_eq!(secrets[0].name, "token");
        assert_eq!(secrets[0].value, "xyz");
        assert_eq!(secrets[0].tags, vec!["ci"]);
        assert!(secrets[0].updated_at >= secrets[0].created_at);
    }

    #[test]
    fn test_delete_last_profile_refused() {
        let (mut store, _dir) = temp_store();
        store.delete_profile(DEFAULT_ID).unwrap();
        assert_eq!(store.root().profiles.len(), 1);
    }

    #[test]
    fn test_delete_current_profile_switches() {
        let (mut store, _dir) = temp_store();
        let id = store.add_profile("Work").unwrap();
        store.set_current_profile(&id).unwrap();

        store.delete_profile(&id).unwrap();

        assert_eq!(store.root().current_profile_id, DEFAULT_ID);
        assert_eq!(store.selected_folder_id(), DEFAULT_ID);
        assert!(store.root().profile(&id).is_none());
    }

    #[test]
    fn test_deletion_cascades() {
        let (mut store, _dir) = temp_store();
        let folder_id = store.add_folder("ci").unwrap();
        store.add_secret(&folder_id, draft("a", "1", &[])).unwrap();
        store.add_secret(&folder_id, draft("b", "2", &[])).unwrap();

        store.delete_folder(&folder_id).unwrap();
        let profile = store.current_profile().unwrap();
        assert!(profile.folder(&folder_id).is_none());
        assert_eq!(profile.folders.len(), 1);

        // Profile deletion removes folders and secrets beneath it
        let pid = store.add_profile("Work").unwrap();
        store.set_current_profile(&pid).unwrap();
        let fid = store.add_folder("api").unwrap();
        store.add_secret(&fid, draft("c", "3", &[])).unwrap();
        store.delete_profile(&pid).unwrap();
        assert!(store.root().profile(&pid).is_none());
    }

    #[test]
    fn test_delete_selected_folder_reselects() {
        let (mut store, _dir) = temp_store();
        let folder_id = store.add_folder("ci").unwrap();
        store.set_selected_folder(&folder_id);

        store.delete_folder(&folder_id).unwrap();

        // Back to the profile's first folder
        assert_eq!(store.selected_folder_id(), DEFAULT_ID);
    }

    #[test]
    fn test_invariants_after_operation_sequence() {
        let (mut store, _dir) = temp_store();
        let p1 = store.add_profile("Work").unwrap();
        let p2 = store.add_profile("Home").unwrap();
        store.set_current_profile(&p1).unwrap();
        let f1 = store.add_folder("api").unwrap();
        store.set_selected_folder(&f1);
        store.add_secret(&f1, draft("k", "v", &[])).unwrap();
        store.delete_profile(&p1).unwrap();
        store.set_current_profile(&p2).unwrap();
        store.delete_profile(&p2).unwrap();

        let root = store.root();
        assert!(root.current_profile().is_some());
        let profile = root.current_profile().unwrap();
        assert!(
            profile.folder(store.selected_folder_id()).is_some()
                || store.selected_folder_id() == DEFAULT_ID
        );
    }

    #[test]
    fn test_filter_by_tag_and_term() {
        let (mut store, _dir) = temp_store();
        store.add_secret(DEFAULT_ID, draft("A", "1", &["x"])).unwrap();
        store.add_secret(DEFAULT_ID, draft("B", "2", &["y"])).unwrap();

        store.set_selected_tags(vec!["x".to_string()]);
        let names: Vec<&str> = store.filtered_secrets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A"]);

        store.set_selected_tags(Vec::new());
        store.set_search_term("b");
        let names: Vec<&str> = store.filtered_secrets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B"]);
    }

    #[test]
    fn test_filter_tags_narrow() {
        let (mut store, _dir) = temp_store();
        store
            .add_secret(DEFAULT_ID, draft("both", "1", &["x", "y"]))
            .unwrap();
        store.add_secret(DEFAULT_ID, draft("only-x", "2", &["x"])).unwrap();

        store.set_selected_tags(vec!["x".to_string(), "y".to_string()]);
        let names: Vec<&str> = store.filtered_secrets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["both"]);
    }

    #[test]
    fn test_filter_matches_value_and_description() {
        let (mut store, _dir) = temp_store();
        store
            .add_secret(
                DEFAULT_ID,
                SecretDraft {
                    name: "opaque".to_string(),
                    value: "sk-SECRET".to_string(),
                    tags: Vec::new(),
                    description: Some("staging deploy key".to_string()),
                },
            )
            .unwrap();

        store.set_search_term("secret");
        assert_eq!(store.filtered_secrets().len(), 1);

        store.set_search_term("staging");
        assert_eq!(store.filtered_secrets().len(), 1);

        store.set_search_term("production");
        assert!(store.filtered_secrets().is_empty());
    }

    #[test]
    fn test_all_tags_sorted_deduplicated() {
        let (mut store, _dir) = temp_store();
        let other = store.add_folder("ci").unwrap();
        store
            .add_secret(DEFAULT_ID, draft("a", "1", &["zeta", "alpha"]))
            .unwrap();
        store.add_secret(&other, draft("b", "2", &["alpha", "mid"])).unwrap();

        assert_eq!(store.all_tags(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_all_tags_scoped_to_current_profile() {
        let (mut store, _dir) = temp_store();
        store.add_secret(DEFAULT_ID, draft("a", "1", &["here"])).unwrap();

        let pid = store.add_profile("Work").unwrap();
        store.set_current_profile(&pid).unwrap();
        assert!(store.all_tags().is_empty());
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let (mut store, _dir) = temp_store();
        store.rename_profile("ghost", "x").unwrap();
        store.set_current_profile("ghost").unwrap();
        store.rename_folder("ghost", "x").unwrap();
        store.delete_folder("ghost").unwrap();
        store.delete_secret(DEFAULT_ID, "ghost").unwrap();
        store
            .update_secret(DEFAULT_ID, "ghost", SecretPatch::default())
            .unwrap();

        assert_eq!(store.root().current_profile_id, DEFAULT_ID);
        assert_eq!(store.root().profiles.len(), 1);
    }

    #[test]
    fn test_load_migrates_v0_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(
            &path,
            r#"{"folders":[{"id":"default","name":"Default","secrets":[]}]}"#,
        )
        .unwrap();

        let store = Store::load(&path);
        assert_eq!(store.root().current_profile_id, DEFAULT_ID);
        assert_eq!(store.root().profiles[0].folders[0].id, DEFAULT_ID);
    }
}
