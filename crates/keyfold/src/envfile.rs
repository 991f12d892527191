//! Plain-text .env import/export
//!
//! One `NAME=value` assignment per line; blank lines and `#`-comments are
//! skipped. Importing into a folder updates secrets with a matching name in
//! place (tags preserved) and appends unknown names with no tags.

use anyhow::{bail, Result};
use keyfold_core::model::Folder;

use crate::store::{SecretDraft, SecretPatch, Store};

/// Parse `.env`-style text into (name, value) pairs
///
/// Lines without a `=` or with an empty name are skipped, matching what the
/// app accepts from pasted file contents.
pub fn parse(content: &str) -> Vec<(String, String)> {
    let mut vars = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        vars.push((name.to_string(), value.trim().to_string()));
    }
    vars
}

/// Render a folder's secrets as `NAME=value` lines, newline-joined
pub fn render(folder: &Folder) -> String {
    folder
        .secrets
        .iter()
        .map(|s| format!("{}={}", s.name, s.value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Import `.env` text into a folder of the current profile; returns the
/// number of assignments applied
pub fn import_into(store: &mut Store, folder_id: &str, content: &str) -> Result<usize> {
    let vars = parse(content);
    if vars.is_empty() {
        bail!("no environment variable assignments found");
    }

    for (name, value) in &vars {
        let existing = store
            .current_profile()
            .and_then(|p| p.folder(folder_id))
            .and_then(|f| f.secrets.iter().find(|s| s.name == *name))
            .map(|s| (s.id.clone(), s.tags.clone()));

        match existing {
            Some((id, tags)) => {
                store.update_secret(
                    folder_id,
                    &id,
                    SecretPatch {
                        name: Some(name.clone()),
                        value: Some(value.clone()),
                        tags: Some(tags),
                        ..Default::default()
                    },
                )?;
            }
            None => {
                store.add_secret(
                    folder_id,
                    SecretDraft {
                        name: name.clone(),
                        value: value.clone(),
                        tags: Vec::new(),
                        description: None,
                    },
                )?;
            }
        }
    }

    Ok(vars.len())
}
