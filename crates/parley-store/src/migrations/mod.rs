//! Schema migrations, applied in order whenever a [`Database`] is opened
//! ([`Database::open_at`], [`Database::open_in_memory`]). `PRAGMA user_version`
//! records the last one applied.
//!
//! [`Database`]: crate::Database
//! [`Database::open_at`]: crate::Database::open_at
//! [`Database::open_in_memory`]: crate::Database::open_in_memory

pub mod v001_messages;
pub mod v002_reactions;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Schema version after every migration below has run.
pub const CURRENT_VERSION: u32 = 2;

/// Run all pending migrations against the open connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "Checking schema version"
    );

    if current < 1 {
        tracing::info!("applying migration v001_messages");
        v001_messages::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    if current < 2 {
        tracing::info!("applying migration v002_reactions");
        v002_reactions::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 2)?;
    }

    Ok(())
}
