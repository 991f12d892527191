//! keyfold - Personal API-key and secrets manager
//!
//! Profiles group folders, folders group tagged secrets. Everything lives
//! in one JSON document under ~/.local/share/keyfold and can optionally
//! mirror to a keyfold-server sync endpoint.
//!
//! Commands:
//! - profile add|rename|delete|use|list
//! - folder add|rename|delete|list
//! - secret add|update|delete|show
//! - list: secrets of a folder, narrowed by search term and tags
//! - tags: every tag used in the current profile
//! - export / import / import-profile: JSON documents
//! - env export|import: .env text for one folder
//! - sync pull|push|status

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use keyfold::config::Config;
use keyfold::store::{SecretDraft, SecretPatch, Store};
use keyfold::sync::SyncClient;
use keyfold::{envfile, import};
use keyfold_core::model::DEFAULT_ID;
use keyfold_core::Paths;

#[derive(Parser)]
#[command(name = "keyfold")]
#[command(about = "Personal API-key and secrets manager - profiles, folders, tagged secrets, optional sync")]
#[command(version)]
#[command(after_help = r#"LAYOUT:
    Secrets are grouped into folders, folders into profiles
    (e.g. a "Work" and a "Personal" profile, each with its own folders).

STORAGE:
    - Store: ~/.local/share/keyfold/keys.json (one JSON document)
    - Config: ~/.config/keyfold/config.json
    - Values are stored in plain text; guard the store file accordingly

SYNC:
    Set syncEnabled/syncUrl in the config (or KEYFOLD_SYNC=1,
    KEYFOLD_SYNC_URL) to mirror the document to a keyfold-server."#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Manage folders in the current profile
    Folder {
        #[command(subcommand)]
        command: FolderCommands,
    },

    /// Manage secrets in a folder of the current profile
    Secret {
        #[command(subcommand)]
        command: SecretCommands,
    },

    /// List secrets of a folder, narrowed by search term and tags
    List {
        /// Folder id or name (defaults to the selected folder)
        #[arg(long)]
        folder: Option<String>,
        /// Case-insensitive substring over name, value, and description
        #[arg(long)]
        search: Option<String>,
        /// Require a tag; may be repeated, all must match
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List every tag used in the current profile
    Tags,

    /// Export the whole store (or one profile) as JSON
    Export {
        /// Output file path (defaults to a dated name in the current directory)
        file: Option<PathBuf>,
        /// Export only this profile (id or name)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Import a JSON document: a full store or a legacy folder bundle
    Import {
        /// JSON file to import
        file: PathBuf,
    },

    /// Import a single exported profile, renaming on collision
    ImportProfile {
        /// JSON file holding one exported profile
        file: PathBuf,
    },

    /// Import or export .env files for one folder
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Pull, push, or inspect the sync state
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Add a profile with one empty default folder
    Add {
        /// Display name
        name: String,
    },
    /// Rename a profile
    Rename {
        /// Profile id
        id: String,
        /// New display name
        name: String,
    },
    /// Delete a profile and everything beneath it
    Delete {
        /// Profile id
        id: String,
    },
    /// Switch the current profile
    Use {
        /// Profile id
        id: String,
    },
    /// List profiles
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FolderCommands {
    /// Add a folder to the current profile
    Add {
        /// Display name
        name: String,
    },
    /// Rename a folder
    Rename {
        /// Folder id or name
        folder: String,
        /// New display name
        name: String,
    },
    /// Delete a folder and its secrets
    Delete {
        /// Folder id or name
        folder: String,
    },
    /// List folders of the current profile
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Store a secret (prompts securely if value not provided)
    Add {
        /// Secret name (e.g. OPENAI_API_KEY)
        name: String,
        /// Secret value (omit for secure hidden prompt)
        value: Option<String>,
        /// Folder id or name (defaults to the selected folder)
        #[arg(long)]
        folder: Option<String>,
        /// Attach a tag; may be repeated
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Free-form description
        #[arg(long)]
        description: Option<String>,
    },
    /// Update fields of a secret; unspecified fields are kept
    Update {
        /// Secret id or name
        secret: String,
        /// Folder id or name (defaults to the selected folder)
        #[arg(long)]
        folder: Option<String>,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New value
        #[arg(long)]
        value: Option<String>,
        /// Replace the tags; may be repeated
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a secret
    Delete {
        /// Secret id or name
        secret: String,
        /// Folder id or name (defaults to the selected folder)
        #[arg(long)]
        folder: Option<String>,
    },
    /// Print a secret value
    Show {
        /// Don't print trailing newline (useful for piping)
        #[arg(short = 'n')]
        no_newline: bool,
        /// Secret id or name
        secret: String,
        /// Folder id or name (defaults to the selected folder)
        #[arg(long)]
        folder: Option<String>,
    },
}

#[derive(Subcommand)]
enum EnvCommands {
    /// Write a folder's secrets as NAME=value lines
    Export {
        /// Output file path (prints to stdout when omitted)
        file: Option<PathBuf>,
        /// Folder id or name (defaults to the selected folder)
        #[arg(long)]
        folder: Option<String>,
    },
    /// Import NAME=value lines into a folder
    Import {
        /// .env file to import
        file: PathBuf,
        /// Folder id or name (defaults to the selected folder)
        #[arg(long)]
        folder: Option<String>,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Replace local state with the remote document
    Pull,
    /// Overwrite the remote document with local state
    Push,
    /// Show the sync configuration
    Status,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let paths = Paths::new();
    let config = Config::load(&paths.config_file())
        .context("failed to load config")?
        .with_env_overrides();
    let sync = SyncClient::new(&config);

    let mut store = Store::load(&paths.store_file());

    // Last-pull-wins on startup; explicit sync commands drive their own I/O
    if !matches!(cli.command, Commands::Sync { .. }) {
        if let Some(root) = sync.pull().await {
            store.replace_root(root)?;
        }
    }

    let mutated = match cli.command {
        Commands::Profile { command } => cmd_profile(&mut store, command)?,
        Commands::Folder { command } => cmd_folder(&mut store, command)?,
        Commands::Secret { command } => cmd_secret(&mut store, command)?,
        Commands::List {
            folder,
            search,
            tags,
            json,
        } => {
            cmd_list(&mut store, folder, search, tags, json)?;
            false
        }
        Commands::Tags => {
            cmd_tags(&store);
            false
        }
        Commands::Export { file, profile } => {
            cmd_export(&store, file, profile)?;
            false
        }
        Commands::Import { file } => cmd_import(&mut store, &file)?,
        Commands::ImportProfile { file } => cmd_import_profile(&mut store, &file)?,
        Commands::Env { command } => cmd_env(&mut store, command)?,
        Commands::Sync { command } => return cmd_sync(&mut store, &sync, command).await,
    };

    if mutated {
        sync.push(store.root()).await;
    }

    Ok(())
}

/// Resolve a folder argument (id or name) in the current profile
fn resolve_folder(store: &Store, arg: Option<&str>) -> Result<String> {
    let profile = store.current_profile().context("no current profile")?;
    match arg {
        Some(arg) => {
            if let Some(folder) = profile.folder(arg) {
                return Ok(folder.id.clone());
            }
            if let Some(folder) = profile.folders.iter().find(|f| f.name == arg) {
                return Ok(folder.id.clone());
            }
            bail!("no folder with id or name: {}", arg);
        }
        None => Ok(store.selected_folder_id().to_string()),
    }
}

/// Resolve a secret argument (id or name) within a folder
fn resolve_secret(store: &Store, folder_id: &str, arg: &str) -> Result<String> {
    let profile = store.current_profile().context("no current profile")?;
    let folder = profile
        .folder(folder_id)
        .with_context(|| format!("no folder with id: {}", folder_id))?;
    folder
        .secrets
        .iter()
        .find(|s| s.id == arg)
        .or_else(|| folder.secrets.iter().find(|s| s.name == arg))
        .map(|s| s.id.clone())
        .with_context(|| format!("no secret with id or name: {}", arg))
}

fn resolve_profile(store: &Store, arg: &str) -> Result<String> {
    store
        .root()
        .profile(arg)
        .or_else(|| store.root().profiles.iter().find(|p| p.name == arg))
        .map(|p| p.id.clone())
        .with_context(|| format!("no profile with id or name: {}", arg))
}

fn cmd_profile(store: &mut Store, command: ProfileCommands) -> Result<bool> {
    match command {
        ProfileCommands::Add { name } => {
            let id = store.add_profile(&name)?;
            println!("success: Profile added: {} ({})", name, id);
            Ok(true)
        }
        ProfileCommands::Rename { id, name } => {
            let id = resolve_profile(store, &id)?;
            store.rename_profile(&id, &name)?;
            println!("success: Profile renamed: {}", name);
            Ok(true)
        }
        ProfileCommands::Delete { id } => {
            let id = resolve_profile(store, &id)?;
            if store.root().profiles.len() <= 1 {
                println!("warning: Refusing to delete the last profile");
                return Ok(false);
            }
            store.delete_profile(&id)?;
            println!("success: Profile deleted: {}", id);
            Ok(true)
        }
        ProfileCommands::Use { id } => {
            let id = resolve_profile(store, &id)?;
            store.set_current_profile(&id)?;
            println!("success: Current profile: {}", id);
            Ok(true)
        }
        ProfileCommands::List { json } => {
            let current = &store.root().current_profile_id;
            if json {
                let profiles: Vec<serde_json::Value> = store
                    .root()
                    .profiles
                    .iter()
                    .map(|p| {
                        json!({
                            "id": p.id,
                            "name": p.name,
                            "folders": p.folders.len(),
                            "current": p.id == *current,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&profiles)?);
                return Ok(false);
            }

            for profile in &store.root().profiles {
                let marker = if profile.id == *current { "*" } else { " " };
                println!(
                    "{} {}  {} ({} folders)",
                    marker,
                    profile.id,
                    profile.name,
                    profile.folders.len()
                );
            }
            Ok(false)
        }
    }
}

fn cmd_folder(store: &mut Store, command: FolderCommands) -> Result<bool> {
    match command {
        FolderCommands::Add { name } => {
            let id = store.add_folder(&name)?;
            println!("success: Folder added: {} ({})", name, id);
            Ok(true)
        }
        FolderCommands::Rename { folder, name } => {
            let id = resolve_folder(store, Some(&folder))?;
            store.rename_folder(&id, &name)?;
            println!("success: Folder renamed: {}", name);
            Ok(true)
        }
        FolderCommands::Delete { folder } => {
            let id = resolve_folder(store, Some(&folder))?;
            if id == DEFAULT_ID {
                println!("warning: The default folder cannot be deleted");
                return Ok(false);
            }
            store.delete_folder(&id)?;
            println!("success: Folder deleted: {}", id);
            Ok(true)
        }
        FolderCommands::List { json } => {
            let profile = store.current_profile().context("no current profile")?;
            if json {
                let folders: Vec<serde_json::Value> = profile
                    .folders
                    .iter()
                    .map(|f| {
                        json!({
                            "id": f.id,
                            "name": f.name,
                            "secrets": f.secrets.len(),
                            "selected": f.id == store.selected_folder_id(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&folders)?);
                return Ok(false);
            }

            for folder in &profile.folders {
                let marker = if folder.id == store.selected_folder_id() {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}  {} ({} secrets)",
                    marker,
                    folder.id,
                    folder.name,
                    folder.secrets.len()
                );
            }
            Ok(false)
        }
    }
}

fn cmd_secret(store: &mut Store, command: SecretCommands) -> Result<bool> {
    match command {
        SecretCommands::Add {
            name,
            value,
            folder,
            tags,
            description,
        } => {
            let folder_id = resolve_folder(store, folder.as_deref())?;

            // Get value - prompt if not provided
            let secret_value = match value {
                Some(v) => v,
                None => {
                    let value = rpassword::prompt_password("Enter secret value: ")
                        .context("Failed to read secret value")?;
                    if value.is_empty() {
                        bail!("Empty value not allowed");
                    }
                    value
                }
            };

            store.add_secret(
                &folder_id,
                SecretDraft {
                    name: name.clone(),
                    value: secret_value,
                    tags,
                    description,
                },
            )?;
            println!("success: Secret stored: {}", name);
            Ok(true)
        }
        SecretCommands::Update {
            secret,
            folder,
            name,
            value,
            tags,
            description,
        } => {
            let folder_id = resolve_folder(store, folder.as_deref())?;
            let id = resolve_secret(store, &folder_id, &secret)?;
            store.update_secret(
                &folder_id,
                &id,
                SecretPatch {
                    name,
                    value,
                    tags: if tags.is_empty() { None } else { Some(tags) },
                    description,
                },
            )?;
            println!("success: Secret updated: {}", secret);
            Ok(true)
        }
        SecretCommands::Delete { secret, folder } => {
            let folder_id = resolve_folder(store, folder.as_deref())?;
            let id = resolve_secret(store, &folder_id, &secret)?;
            store.delete_secret(&folder_id, &id)?;
            println!("success: Secret deleted: {}", secret);
            Ok(true)
        }
        SecretCommands::Show {
            no_newline,
            secret,
            folder,
        } => {
            let folder_id = resolve_folder(store, folder.as_deref())?;
            let id = resolve_secret(store, &folder_id, &secret)?;
            let profile = store.current_profile().context("no current profile")?;
            let value = profile
                .folder(&folder_id)
                .and_then(|f| f.secrets.iter().find(|s| s.id == id))
                .map(|s| s.value.clone())
                .context("secret disappeared")?;

            if no_newline {
                print!("{}", value);
            } else {
                println!("{}", value);
            }
            Ok(false)
        }
    }
}

fn cmd_list(
    store: &mut Store,
    folder: Option<String>,
    search: Option<String>,
    tags: Vec<String>,
    json: bool,
) -> Result<()> {
    let folder_id = resolve_folder(store, folder.as_deref())?;
    store.set_selected_folder(&folder_id);
    store.set_search_term(search.as_deref().unwrap_or(""));
    store.set_selected_tags(tags);

    let secrets = store.filtered_secrets();

    if json {
        println!("{}", serde_json::to_string_pretty(&secrets)?);
        return Ok(());
    }

    if secrets.is_empty() {
        println!("No secrets match. Add one with: keyfold secret add <name>");
        return Ok(());
    }

    for secret in secrets {
        let tags = if secret.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", secret.tags.join(", "))
        };
        println!("  {}  {}{}", secret.id, secret.name, tags);
    }
    Ok(())
}

fn cmd_tags(store: &Store) {
    for tag in store.all_tags() {
        println!("  {}", tag);
    }
}

fn cmd_export(store: &Store, file: Option<PathBuf>, profile: Option<String>) -> Result<()> {
    match profile {
        Some(arg) => {
            let id = resolve_profile(store, &arg)?;
            let profile = store.root().profile(&id).context("profile disappeared")?;
            let content = import::export_profile(profile)?;
            let short = &profile.id[..profile.id.len().min(8)];
            let path = file.unwrap_or_else(|| {
                PathBuf::from(format!("export-profile-{}-{}.json", profile.name, short))
            });
            fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("success: Profile exported to: {}", path.display());
        }
        None => {
            let content = import::export_root(store.root())?;
            let path = file.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "export-all-profiles-{}.json",
                    Utc::now().format("%Y-%m-%d")
                ))
            });
            fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("success: Store exported to: {}", path.display());
        }
    }
    Ok(())
}

fn cmd_import(store: &mut Store, file: &PathBuf) -> Result<bool> {
    if !file.exists() {
        bail!("Import file not found: {}", file.display());
    }
    let content = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    match import::import_document(store, &content)? {
        import::ImportOutcome::ReplacedRoot => {
            println!("success: Store replaced from imported document");
        }
        import::ImportOutcome::AppendedProfile { id, name } => {
            println!("success: Imported legacy bundle as profile: {} ({})", name, id);
        }
    }
    Ok(true)
}

fn cmd_import_profile(store: &mut Store, file: &PathBuf) -> Result<bool> {
    if !file.exists() {
        bail!("Import file not found: {}", file.display());
    }
    let content = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let imported = import::import_profile(store, &content)?;
    println!("success: Profile imported: {} ({})", imported.name, imported.id);
    Ok(true)
}

fn cmd_env(store: &mut Store, command: EnvCommands) -> Result<bool> {
    match command {
        EnvCommands::Export { file, folder } => {
            let folder_id = resolve_folder(store, folder.as_deref())?;
            let profile = store.current_profile().context("no current profile")?;
            let folder = profile
                .folder(&folder_id)
                .with_context(|| format!("no folder with id: {}", folder_id))?;
            let content = envfile::render(folder);

            match file {
                Some(path) => {
                    fs::write(&path, content)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("success: Folder exported to: {}", path.display());
                    println!("Make sure to keep your secrets safe!");
                }
                None => println!("{}", content),
            }
            Ok(false)
        }
        EnvCommands::Import { file, folder } => {
            let folder_id = resolve_folder(store, folder.as_deref())?;
            if !file.exists() {
                bail!("Import file not found: {}", file.display());
            }
            let content = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let count = envfile::import_into(store, &folder_id, &content)?;
            println!("success: Imported {} environment variables", count);
            Ok(true)
        }
    }
}

async fn cmd_sync(store: &mut Store, sync: &SyncClient, command: SyncCommands) -> Result<()> {
    match command {
        SyncCommands::Status => {
            println!("Sync {}", if sync.enabled() { "enabled" } else { "disabled" });
            println!("Endpoint: {}", sync.endpoint());
            println!("Store: {}", store.path().display());
            Ok(())
        }
        SyncCommands::Pull => {
            if !sync.enabled() {
                bail!("sync is disabled (set syncEnabled in config or KEYFOLD_SYNC=1)");
            }
            let root = sync.try_pull().await?;
            store.replace_root(root)?;
            println!("success: Pulled remote document");
            Ok(())
        }
        SyncCommands::Push => {
            if !sync.enabled() {
                bail!("sync is disabled (set syncEnabled in config or KEYFOLD_SYNC=1)");
            }
            sync.try_push(store.root()).await?;
            println!("success: Pushed local document");
            Ok(())
        }
    }
}
