//! # parley-server
//!
//! Chat backend for Parley.
//!
//! This binary provides:
//! - **REST API** (axum) for chat turns, message CRUD, reactions, favorites
//!   and filtered queries
//! - **Push channel** (`/ws`) that fans every message change out to all of the
//!   owner's open sessions, with heartbeat-based eviction of dead peers
//! - **Storage** in process memory or SQLite

mod api;
mod auth;
mod completion;
mod config;
mod error;
mod hub;
mod service;
mod users;
mod ws;

use std::sync::Arc;

use parley_store::{Database, MemoryStore, MessageStore, SqliteStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::completion::{Completer, DisabledCompleter, OpenAiCompleter};
use crate::config::{ServerConfig, StorageBackend};
use crate::users::InMemoryUserDirectory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug,parley_store=debug")),
        )
        .init();

    info!("Starting Parley server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let store: Arc<dyn MessageStore> = match config.storage {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Sqlite => {
            let db = match &config.database_path {
                Some(path) => Database::open_at(path)?,
                None => Database::new()?,
            };
            info!(path = ?db.path(), "Opened SQLite store");
            Arc::new(SqliteStore::new(db))
        }
    };

    let users = Arc::new(InMemoryUserDirectory::new(config.seed_users.clone()));
    if users.is_empty() {
        warn!("User directory is empty, every request will be rejected");
    } else {
        info!(users = users.len(), "Loaded user directory");
    }

    let completer: Arc<dyn Completer> = match &config.completion.api_key {
        Some(key) => Arc::new(OpenAiCompleter::new(&config.completion, key.clone())?),
        None => {
            warn!("No completion API key configured, chat turns will fail");
            Arc::new(DisabledCompleter)
        }
    };

    let http_addr = config.http_addr;
    let heartbeat = config.heartbeat_interval;
    let app_state = AppState::new(config, store, users, completer);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------
    let _sweeper = hub::spawn_liveness_sweep(app_state.registry.clone(), heartbeat);

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
