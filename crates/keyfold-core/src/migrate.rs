//! Migration of stored documents to the current Root shape
//!
//! Three historical shapes exist in the wild: the current profile-aware
//! root, the folder-only V0 root, and anything older or unrecognizable.
//! [`migrate`] accepts any parseable JSON and always produces a usable Root;
//! unknown shapes fall through to the canonical empty document.

use chrono::Utc;
use serde_json::Value;

use crate::model::{self, Profile, Root, DEFAULT_ID};

/// Upgrade an arbitrary stored JSON value into the current Root shape
///
/// Checked in order, first match wins:
/// 1. profile-aware root: passed through, with the current-profile pointer
///    healed when stale
/// 2. V0 folder list: wrapped into a single synthetic "Default" profile
/// 3. anything else: the canonical empty Root
///
/// Idempotent: migrating an already-current Root returns it unchanged aside
/// from the pointer heal.
pub fn migrate(raw: &Value) -> Root {
    if raw.get("profiles").is_some() {
        if let Ok(mut root) = model::validate_root(raw) {
            root.normalize_current();
            return root;
        }
    }

    if raw.get("folders").is_some() {
        if let Ok(bundle) = model::validate_bundle(raw) {
            let now = Utc::now();
            return Root {
                profiles: vec![Profile {
                    id: DEFAULT_ID.to_string(),
                    name: "Default".to_string(),
                    folders: bundle.folders,
                    created_at: now,
                    updated_at: now,
                }],
                current_profile_id: DEFAULT_ID.to_string(),
            };
        }
    }

    Root::canonical_default()
}
