//! keyfold - Personal API-key and secrets manager
//!
//! Profiles group folders, folders group tagged secrets. State persists as
//! a single JSON document and can optionally mirror to a keyfold-server
//! sync endpoint.

pub mod config;
pub mod envfile;
pub mod import;
pub mod store;
pub mod sync;

pub use config::Config;
pub use store::{SecretDraft, SecretPatch, Store};
pub use sync::SyncClient;
