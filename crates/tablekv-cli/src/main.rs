//! tablekv — command-line front end for the namespaced key-value store.
//!
//! # Usage
//!
//! ```text
//! tablekv --config tablekv.toml put users u1 '{"name":"Ann"}'
//! tablekv --sqlite ./kv.db get-all users
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tablekv_store::{KvStore, StoreConfig, StoreResult};
use tracing::{debug, warn};

mod commands;

const DEFAULT_CONFIG: &str = "tablekv.toml";

#[derive(Parser)]
#[command(
    name = "tablekv",
    about = "Namespaced key-value store over MySQL or SQLite",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to tablekv.toml (default: ./tablekv.toml).
    #[arg(short, long, env = "TABLEKV_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Use a local SQLite database file; takes precedence over --config.
    #[arg(long, global = true)]
    sqlite: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage namespaces
    Namespaces {
        #[command(subcommand)]
        action: NamespaceAction,
    },
    /// Store a JSON value under a key
    Put {
        namespace: String,
        key: String,
        /// JSON value, or "-" to read it from stdin
        value: String,
        /// Fail with ITEM_CONFLICT instead of replacing an existing value
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Print the value stored under a key
    Get { namespace: String, key: String },
    /// Print every record in a namespace as a JSON object
    GetAll { namespace: String },
    /// Report whether a key exists
    Exists { namespace: String, key: String },
    /// Delete one key (missing keys are not an error)
    Delete { namespace: String, key: String },
    /// Delete every record in a namespace
    DeleteAll { namespace: String },
}

#[derive(Subcommand)]
enum NamespaceAction {
    /// List all namespaces
    List,
    /// Create a namespace if it does not exist
    Create { namespace: String },
    /// Drop a namespace and all of its records
    Drop { namespace: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tablekv=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.sqlite.as_deref())?;
    debug!(backend = ?config.backend, "configuration loaded");

    let store = KvStore::connect(&config)
        .await
        .context("could not connect to the storage backend")?;

    let result = run(&store, cli.command).await;
    finish(result, store.shutdown().await)
}

/// Combine the command outcome with the shutdown outcome. A command error
/// wins; a shutdown failure after it is only logged.
fn finish(result: anyhow::Result<()>, shutdown: StoreResult<()>) -> anyhow::Result<()> {
    match (result, shutdown) {
        (Err(e), Err(shutdown_err)) => {
            warn!(error = %shutdown_err, "store shutdown failed");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), shutdown) => shutdown.context("store shutdown failed"),
    }
}

async fn run(store: &KvStore, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Namespaces { action } => match action {
            NamespaceAction::List => commands::namespaces::list(store).await,
            NamespaceAction::Create { namespace } => {
                commands::namespaces::create(store, &namespace).await
            }
            NamespaceAction::Drop { namespace } => {
                commands::namespaces::drop_namespace(store, &namespace).await
            }
        },
        Commands::Put {
            namespace,
            key,
            value,
            no_overwrite,
        } => commands::records::put(store, &namespace, &key, &value, !no_overwrite).await,
        Commands::Get { namespace, key } => commands::records::get(store, &namespace, &key).await,
        Commands::GetAll { namespace } => commands::records::get_all(store, &namespace).await,
        Commands::Exists { namespace, key } => {
            commands::records::exists(store, &namespace, &key).await
        }
        Commands::Delete { namespace, key } => {
            commands::records::delete(store, &namespace, &key).await
        }
        Commands::DeleteAll { namespace } => {
            commands::records::delete_all(store, &namespace).await
        }
    }
}

fn load_config(config: Option<&Path>, sqlite: Option<&Path>) -> anyhow::Result<StoreConfig> {
    if let Some(path) = sqlite {
        return Ok(StoreConfig::sqlite(path));
    }
    let path = config.unwrap_or(Path::new(DEFAULT_CONFIG));
    StoreConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}
