use parley_shared::{MessageId, ValidationError};
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No message with this id exists.
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    /// The input was rejected before touching storage.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A JSON column (tags, metadata) could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row holds a value no current type can represent.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// A thread panicked while holding the database lock.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A blocking database task was cancelled or panicked.
    #[error("Storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Whether the caller addressed something that does not exist or sent
    /// bad input, as opposed to a fault inside the backend.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::Validation(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
