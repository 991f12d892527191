//! Data model for the keyfold store
//!
//! A Root document owns profiles, profiles own folders, folders own secrets.
//! The tree is strictly hierarchical with no cross-references. Serialized
//! JSON uses camelCase field names so documents stay interchangeable with
//! exports produced by older versions of the app.
//!
//! Validation is built bottom-up from the serde derives (Secret -> Folder ->
//! Profile -> Root) and returns a tagged [`SchemaError`] instead of
//! panicking, so every caller can pick its own fallback. It runs on every
//! boundary crossing: loading from disk, pulling from the sync server,
//! accepting a POST body, and importing a user-supplied file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Id of the profile and folder created when no durable state exists
pub const DEFAULT_ID: &str = "default";

/// Structural validation failure at a document boundary
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("not a valid root document: {0}")]
    Root(String),

    #[error("not a valid profile: {0}")]
    Profile(String),

    #[error("not a valid folder bundle: {0}")]
    Bundle(String),
}

/// A named secret value with tags, description, and timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Opaque id, unique within the owning folder
    pub id: String,
    pub name: String,
    pub value: String,
    /// Order-insignificant for matching, preserved for display
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named grouping of secrets within a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    /// Opaque id, unique within the owning profile
    pub id: String,
    pub name: String,
    pub secrets: Vec<Secret>,
}

/// A named, independent collection of folders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Opaque id, unique within the root document
    pub id: String,
    pub name: String,
    pub folders: Vec<Folder>,
    /// Missing timestamps are backfilled with the current time on read
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// The single top-level persisted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    pub profiles: Vec<Profile>,
    /// Points at the active profile; healed to the first profile when stale
    #[serde(default)]
    pub current_profile_id: String,
}

/// The pre-profile persisted shape: a bare folder list
///
/// Accepted on read and as an import bundle, never produced on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyBundle {
    pub folders: Vec<Folder>,
}

impl Folder {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            secrets: Vec::new(),
        }
    }
}

impl Profile {
    /// Look up a folder by id
    pub fn folder(&self, id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn folder_mut(&mut self, id: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| f.id == id)
    }

    /// Id of the first folder, or the `"default"` placeholder when the
    /// profile has no folders
    pub fn first_folder_id(&self) -> String {
        self.folders
            .first()
            .map(|f| f.id.clone())
            .unwrap_or_else(|| DEFAULT_ID.to_string())
    }
}

impl Root {
    /// The document created when no durable state exists: one default
    /// profile holding one empty default folder
    pub fn canonical_default() -> Self {
        let now = Utc::now();
        Self {
            profiles: vec![Profile {
                id: DEFAULT_ID.to_string(),
                name: "Default".to_string(),
                folders: vec![Folder::new(DEFAULT_ID, "Default")],
                created_at: now,
                updated_at: now,
            }],
            current_profile_id: DEFAULT_ID.to_string(),
        }
    }

    /// Look up a profile by id
    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn profile_mut(&mut self, id: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    /// The profile `current_profile_id` points at
    pub fn current_profile(&self) -> Option<&Profile> {
        self.profile(&self.current_profile_id)
    }

    pub fn current_profile_mut(&mut self) -> Option<&mut Profile> {
        let id = self.current_profile_id.clone();
        self.profile_mut(&id)
    }

    /// Point `current_profile_id` at the first profile when it references
    /// nothing that exists
    pub fn normalize_current(&mut self) {
        let exists = self.profiles.iter().any(|p| p.id == self.current_profile_id);
        if !exists {
            if let Some(first) = self.profiles.first() {
                self.current_profile_id = first.id.clone();
            }
        }
    }
}

/// Validate an arbitrary parsed JSON value as a Root document
///
/// A root must carry a non-empty profile list; `current_profile_id` may be
/// absent (it is healed afterwards by [`Root::normalize_current`]).
pub fn validate_root(value: &Value) -> Result<Root, SchemaError> {
    let root = Root::deserialize(value).map_err(|e| SchemaError::Root(e.to_string()))?;
    if root.profiles.is_empty() {
        return Err(SchemaError::Root("profiles must not be empty".to_string()));
    }
    Ok(root)
}

/// Validate an arbitrary parsed JSON value as a single Profile
pub fn validate_profile(value: &Value) -> Result<Profile, SchemaError> {
    Profile::deserialize(value).map_err(|e| SchemaError::Profile(e.to_string()))
}

/// Validate an arbitrary parsed JSON value as a legacy folder bundle
pub fn validate_bundle(value: &Value) -> Result<LegacyBundle, SchemaError> {
    LegacyBundle::deserialize(value).map_err(|e| SchemaError::Bundle(e.to_string()))
}
