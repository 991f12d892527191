//! Keyfold Core - Shared functionality for the keyfold tools
//!
//! The profile/folder/secret data model, schema validation, and migration
//! rules shared by the CLI and the sync server.

pub mod migrate;
pub mod model;
pub mod paths;

pub use model::{Folder, LegacyBundle, Profile, Root, SchemaError, Secret};
pub use paths::Paths;
