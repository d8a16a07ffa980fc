//! Server configuration loaded from environment variables.
//!
//! Every setting has a default, so the server starts with zero configuration
//! for local development (in-memory storage, one demo user, no completions).

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use parley_shared::constants::{CONNECTION_BUFFER, DEFAULT_HTTP_PORT, HEARTBEAT_INTERVAL_SECS};
use parley_shared::UserId;

use crate::users::{parse_seed_users, User};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear and concise responses.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API and push endpoint.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// Env: `STORAGE` (`memory` or `sqlite`)
    /// Default: `memory`
    pub storage: StorageBackend,

    /// SQLite file. `None` means the platform data directory.
    /// Env: `DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Time between two liveness sweeps.
    /// Env: `HEARTBEAT_INTERVAL_SECS`
    /// Default: 30 s
    pub heartbeat_interval: Duration,

    /// Frames buffered per connection before it is evicted as stalled.
    /// Env: `CONNECTION_BUFFER`
    /// Default: 256
    pub connection_buffer: usize,

    /// Accounts known to the user directory.
    /// Env: `SEED_USERS` (`id:name,id:name`)
    /// Default: `1:demo`
    pub seed_users: Vec<User>,

    pub completion: CompletionConfig,
}

/// Text-completion provider settings.
#[derive(Clone)]
pub struct CompletionConfig {
    /// Env: `COMPLETION_API_URL`
    pub api_url: String,
    /// Env: `COMPLETION_API_KEY`, falling back to `OPENAI_API_KEY`.
    /// Completions are disabled when unset.
    pub api_key: Option<String>,
    /// Env: `COMPLETION_MODEL`
    pub model: String,
    /// Env: `SYSTEM_PROMPT`
    pub system_prompt: String,
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            storage: StorageBackend::Memory,
            database_path: None,
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            connection_buffer: CONNECTION_BUFFER,
            seed_users: vec![User {
                id: UserId(1),
                username: "demo".to_string(),
            }],
            completion: CompletionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(storage) = var("STORAGE") {
            match storage.trim().to_ascii_lowercase().as_str() {
                "memory" => config.storage = StorageBackend::Memory,
                "sqlite" => config.storage = StorageBackend::Sqlite,
                _ => tracing::warn!(value = %storage, "Invalid STORAGE, using memory"),
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = var("HEARTBEAT_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.heartbeat_interval = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid HEARTBEAT_INTERVAL_SECS, using default"),
            }
        }

        if let Some(val) = var("CONNECTION_BUFFER") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.connection_buffer = n,
                _ => tracing::warn!(value = %val, "Invalid CONNECTION_BUFFER, using default"),
            }
        }

        if let Some(raw) = var("SEED_USERS") {
            match parse_seed_users(&raw) {
                Ok(users) => config.seed_users = users,
                Err(e) => tracing::warn!(error = %e, "Invalid SEED_USERS, using default"),
            }
        }

        if let Some(url) = var("COMPLETION_API_URL") {
            config.completion.api_url = url.trim_end_matches('/').to_string();
        }

        config.completion.api_key = var("COMPLETION_API_KEY")
            .or_else(|| var("OPENAI_API_KEY"))
            .filter(|key| !key.is_empty());

        if let Some(model) = var("COMPLETION_MODEL") {
            config.completion.model = model;
        }

        if let Some(prompt) = var("SYSTEM_PROMPT") {
            config.completion.system_prompt = prompt;
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }
}
