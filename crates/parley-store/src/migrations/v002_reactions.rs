use rusqlite::Connection;

// One row per reacting user; the primary key makes a repeated add a no-op.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS reactions (
    message_id INTEGER NOT NULL,           -- FK -> messages(id)
    user_id    INTEGER NOT NULL,
    kind       TEXT NOT NULL,              -- emoji or short name
    created_at TEXT NOT NULL,              -- RFC-3339, UTC

    PRIMARY KEY (message_id, user_id),
    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
