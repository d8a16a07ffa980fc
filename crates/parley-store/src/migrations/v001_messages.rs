//! v001 -- Initial schema creation.
//!
//! Creates `messages` and the append-only `message_edits` log.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,  -- never reused
    user_id      INTEGER NOT NULL,
    role         TEXT NOT NULL,                      -- user | assistant
    content      TEXT NOT NULL,
    content_type TEXT NOT NULL,                      -- text | code | file
    tags         TEXT NOT NULL DEFAULT '[]',         -- JSON array
    metadata     TEXT NOT NULL DEFAULT '{}',         -- JSON object
    timestamp    TEXT NOT NULL,                      -- RFC-3339, UTC
    edited       INTEGER NOT NULL DEFAULT 0,
    deleted      INTEGER NOT NULL DEFAULT 0,
    favorite     INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_user_ts
    ON messages(user_id, timestamp);

-- ----------------------------------------------------------------
-- Edit history (prior contents, append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS message_edits (
    message_id INTEGER NOT NULL,
    seq        INTEGER NOT NULL,                     -- 0-based edit number
    content    TEXT NOT NULL,                        -- content before the edit
    edited_at  TEXT NOT NULL,                        -- RFC-3339, UTC

    PRIMARY KEY (message_id, seq),
    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);
"#;

/// Apply the v001 migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
