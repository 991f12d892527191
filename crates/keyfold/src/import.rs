//! Import/export of JSON documents
//!
//! Two shapes are auto-detected from a pasted or uploaded document: the full
//! root (replaces the local store wholesale) and the legacy folder bundle
//! (wrapped into a new "Imported" profile). A single exported profile is a
//! dedicated entry point invoked explicitly, never auto-detected; colliding
//! profiles are appended under a rewritten id/name rather than overwritten.

use anyhow::Result;
use chrono::Utc;
use keyfold_core::model::{self, LegacyBundle, Profile, Root};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::store::Store;

/// Import failure; durable state is left untouched on any of these
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document matches no importable shape (expected a root document or a legacy folder bundle)")]
    UnknownShape,
}

/// A detected import document
#[derive(Debug, Clone, PartialEq)]
pub enum ImportPayload {
    /// Full root document: replaces the local store
    Root(Root),
    /// Legacy folder-only bundle: appended as a new profile
    Bundle(LegacyBundle),
}

/// What an import did, for reporting back to the user
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    ReplacedRoot,
    AppendedProfile { id: String, name: String },
}

/// Detect which importable shape a parsed document has
///
/// The full root is tried first, then the legacy bundle; anything else is
/// rejected with a structural-validation error.
pub fn detect(value: &Value) -> Result<ImportPayload, ImportError> {
    if let Ok(root) = model::validate_root(value) {
        return Ok(ImportPayload::Root(root));
    }
    if let Ok(bundle) = model::validate_bundle(value) {
        return Ok(ImportPayload::Bundle(bundle));
    }
    Err(ImportError::UnknownShape)
}

/// Import a JSON document (full root or legacy bundle) into the store
pub fn import_document(store: &mut Store, content: &str) -> Result<ImportOutcome> {
    let value: Value = serde_json::from_str(content).map_err(ImportError::Json)?;
    match detect(&value)? {
        ImportPayload::Root(root) => {
            store.replace_root(root)?;
            Ok(ImportOutcome::ReplacedRoot)
        }
        ImportPayload::Bundle(bundle) => {
            let now = Utc::now();
            let profile = Profile {
                id: Uuid::new_v4().to_string(),
                name: "Imported".to_string(),
                folders: bundle.folders,
                created_at: now,
                updated_at: now,
            };
            let outcome = ImportOutcome::AppendedProfile {
                id: profile.id.clone(),
                name: profile.name.clone(),
            };
            store.append_profile(profile)?;
            Ok(outcome)
        }
    }
}

/// The profile a single-profile import appended, after any collision rewrite
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedProfile {
    pub id: String,
    pub name: String,
}

/// Import a single exported profile, appending under a fresh id (and a
/// dated name) when the id or name collides with an existing profile
pub fn import_profile(store: &mut Store, content: &str) -> Result<ImportedProfile> {
    let value: Value = serde_json::from_str(content).map_err(ImportError::Json)?;
    let mut profile = model::validate_profile(&value)?;

    let id_clash = store.root().profiles.iter().any(|p| p.id == profile.id);
    let name_clash = store.root().profiles.iter().any(|p| p.name == profile.name);

    if id_clash || name_clash {
        profile.id = Uuid::new_v4().to_string();
        if name_clash {
            profile.name = format!(
                "{} (Imported {})",
                profile.name,
                Utc::now().format("%Y-%m-%d")
            );
        }
        let now = Utc::now();
        profile.created_at = now;
        profile.updated_at = now;
    }

    let imported = ImportedProfile {
        id: profile.id.clone(),
        name: profile.name.clone(),
    };
    store.append_profile(profile)?;
    Ok(imported)
}

/// Serialize the whole root document for export
pub fn export_root(root: &Root) -> Result<String> {
    Ok(serde_json::to_string_pretty(root)?)
}

/// Serialize one profile for export
pub fn export_profile(profile: &Profile) -> Result<String> {
    Ok(serde_json::to_string_pretty(profile)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SecretDraft;
    use keyfold_core::model::DEFAULT_ID;
    use serde_json::json;
    use tempfile::TempDir;

    fn temp_store() -> (Store, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(&dir.path().join("keys.json"));
        (store, dir)
    }

    #[test]
    fn test_detect_root() {
        let value = serde_json::to_value(Root::canonical_default()).unwrap();
        assert!(matches!(detect(&value), Ok(ImportPayload::Root(_))));
    }

    #[test]
    fn test_detect_bundle() {
        let value = json!({"folders": [{"id": "f1", "name": "APIs", "secrets": []}]});
        assert!(matches!(detect(&value), Ok(ImportPayload::Bundle(_))));
    }

    #[test]
    fn test_detect_rejects_unknown() {
        assert!(matches!(
            detect(&json!({"nope": true})),
            Err(ImportError::UnknownShape)
        ));
    }

    #[test]
    fn test_full_root_import_replaces() {
        let (mut store, _dir) = temp_store();
        store
            .add_secret(
                DEFAULT_ID,
                SecretDraft {
                    name: "gone".to_string(),
                    value: "1".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        let incoming = json!({
            "profiles": [{
                "id": "p1",
                "name": "Work",
                "folders": [{"id": "f1", "name": "APIs", "secrets": []}]
            }],
            "currentProfileId": "stale"
        });

        let outcome = import_document(&mut store, &incoming.to_string()).unwrap();
        assert_eq!(outcome, ImportOutcome::ReplacedRoot);
        // Replaced wholesale; pointer healed, timestamps backfilled
        assert_eq!(store.root().profiles.len(), 1);
        assert_eq!(store.root().current_profile_id, "p1");
        assert!(store.root().profile(DEFAULT_ID).is_none());
    }

    #[test]
    fn test_bundle_import_appends_profile() {
        let (mut store, _dir) = temp_store();
        let incoming = json!({
            "folders": [{"id": "f1", "name": "APIs", "secrets": []}]
        });

        let outcome = import_document(&mut store, &incoming.to_string()).unwrap();
        let ImportOutcome::AppendedProfile { id, name } = outcome else {
            panic!("expected appended profile");
        };
        assert_eq!(name, "Imported");
        // Existing current profile is kept
        assert_eq!(store.root().current_profile_id, DEFAULT_ID);
        assert_eq!(store.root().profiles.len(), 2);
        assert!(store.root().profile(&id).is_some());
    }

    #[test]
    fn test_unknown_shape_leaves_store_untouched() {
        let (mut store, _dir) = temp_store();
        store
            .add_secret(
                DEFAULT_ID,
                SecretDraft {
                    name: "kept".to_string(),
                    value: "1".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(import_document(&mut store, r#"{"nope": true}"#).is_err());
        assert!(import_document(&mut store, "not json at all").is_err());

        let reloaded = Store::load(store.path());
        assert_eq!(reloaded.filtered_secrets().len(), 1);
    }

    #[test]
    fn test_profile_import_no_collision_appends_as_is() {
        let (mut store, _dir) = temp_store();
        let incoming = json!({
            "id": "p-work",
            "name": "Work",
            "folders": [{"id": "f1", "name": "APIs", "secrets": []}],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });

        let imported = import_profile(&mut store, &incoming.to_string()).unwrap();
        assert_eq!(imported.id, "p-work");
        assert_eq!(imported.name, "Work");
    }

    #[test]
    fn test_profile_import_duplicate_name_renamed() {
        let (mut store, _dir) = temp_store();
        store.add_profile("Work").unwrap();

        let incoming = json!({
            "id": "p-other",
            "name": "Work",
            "folders": []
        });

        let imported = import_profile(&mut store, &incoming.to_string()).unwrap();
        assert_ne!(imported.id, "p-other");
        let expected = format!("Work (Imported {})", Utc::now().format("%Y-%m-%d"));
        assert_eq!(imported.name, expected);

        // Original untouched, import appended
        let originals: Vec<&Profile> = store
            .root()
            .profiles
            .iter()
            .filter(|p| p.name == "Work")
            .collect();
        assert_eq!(originals.len(), 1);
        assert!(store.root().profile(&imported.id).is_some());
    }

    #[test]
    fn test_profile_import_duplicate_id_gets_fresh_id() {
        let (mut store, _dir) = temp_store();
        let incoming = json!({
            "id": DEFAULT_ID,
            "name": "Elsewhere",
            "folders": []
        });

        let imported = import_profile(&mut store, &incoming.to_string()).unwrap();
        assert_ne!(imported.id, DEFAULT_ID);
        // Name did not collide, so it is kept
        assert_eq!(imported.name, "Elsewhere");
    }

    #[test]
    fn test_profile_round_trip() {
        let (mut store, _dir) = temp_store();
        let folder_id = store.add_folder("api").unwrap();
        store
            .add_secret(
                &folder_id,
                SecretDraft {
                    name: "token".to_string(),
                    value: "sk-123".to_string(),
                    tags: vec!["ci".to_string()],
                    description: Some("deploy".to_string()),
                },
            )
            .unwrap();
        let exported = export_profile(store.current_profile().unwrap()).unwrap();

        // Import into a different store with unrelated state
        let (mut other, _dir2) = temp_store();
        other.add_profile("Unrelated").unwrap();
        let appended = import_profile(&mut other, &exported).unwrap();

        let imported = other.root().profile(&appended.id).unwrap();
        let original = store.current_profile().unwrap();
        assert_eq!(imported.folders, original.folders);
    }

    #[test]
    fn test_export_root_parses_back() {
        let root = Root::canonical_default();
        let text = export_root(&root).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(model::validate_root(&value).unwrap(), root);
    }
}
