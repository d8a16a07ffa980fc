//! CRUD operations for [`Message`] records.
//!
//! Timestamps are stored as fixed-width RFC-3339 strings with nanosecond
//! precision, so they round-trip exactly and sort lexicographically.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use parley_shared::message::validate_content;
use parley_shared::{ContentType, EditSnapshot, Message, MessageId, NewMessage, Role, UserId};
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};

use crate::database::Database;
use crate::error::{Result, StoreError};

const SELECT_COLUMNS: &str = "SELECT id, user_id, role, content, content_type, tags, metadata,
        timestamp, edited, deleted, favorite
 FROM messages";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Validate and insert a new message. The id comes from SQLite's
    /// `AUTOINCREMENT`, so ids are never reused.
    pub fn insert_message(&self, new: NewMessage, timestamp: DateTime<Utc>) -> Result<Message> {
        let mut message = new.into_message(MessageId(0), timestamp)?;
        let tags: Vec<&String> = message.tags.iter().collect();

        self.conn().execute(
            "INSERT INTO messages (user_id, role, content, content_type, tags, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.user_id.0,
                message.role.as_str(),
                message.content,
                message.content_type.as_str(),
                serde_json::to_string(&tags)?,
                serde_json::to_string(&message.metadata)?,
                format_ts(&message.timestamp),
            ],
        )?;

        message.id = MessageId(self.conn().last_insert_rowid());
        Ok(message)
    }

    /// Insert two messages in one transaction. A rejected second message
    /// rolls back the first.
    pub fn insert_message_pair(
        &self,
        first: NewMessage,
        second: NewMessage,
        timestamp: DateTime<Utc>,
    ) -> Result<(Message, Message)> {
        let tx = self.conn().unchecked_transaction()?;
        let first = self.insert_message(first, timestamp)?;
        let second = self.insert_message(second, timestamp)?;
        tx.commit()?;
        Ok((first, second))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single message by id, soft-deleted or not.
    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        let row = self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.0],
                MessageRow::from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))?;

        self.hydrate(row)
    }

    /// All non-deleted messages of a user, oldest first.
    pub fn visible_messages_for_user(&self, user: UserId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE user_id = ?1 AND deleted = 0
             ORDER BY timestamp ASC, id ASC"
        ))?;

        let rows = stmt.query_map(params![user.0], MessageRow::from_row)?;

        let mut raw = Vec::new();
        for row in rows {
            raw.push(row?);
        }

        raw.into_iter().map(|row| self.hydrate(row)).collect()
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace a message's content, appending the prior content to
    /// `message_edits` in the same transaction. Soft-deleted messages are
    /// `NotFound`.
    pub fn edit_message(
        &self,
        id: MessageId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Message> {
        validate_content(content)?;

        let tx = self.conn().unchecked_transaction()?;

        let (previous, seq): (String, i64) = tx
            .query_row(
                "SELECT content,
                        (SELECT COUNT(*) FROM message_edits WHERE message_id = ?1)
                 FROM messages WHERE id = ?1 AND deleted = 0",
                params![id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))?;

        tx.execute(
            "INSERT INTO message_edits (message_id, seq, content, edited_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id.0, seq, previous, format_ts(&at)],
        )?;
        tx.execute(
            "UPDATE messages SET content = ?2, edited = 1 WHERE id = ?1",
            params![id.0, content],
        )?;

        tx.commit()?;
        self.get_message(id)
    }

    /// Set the soft-delete flag. Already-deleted messages stay deleted.
    pub fn soft_delete_message(&self, id: MessageId) -> Result<Message> {
        let affected = self
            .conn()
            .execute("UPDATE messages SET deleted = 1 WHERE id = ?1", params![id.0])?;
        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        self.get_message(id)
    }

    pub fn toggle_favorite(&self, id: MessageId) -> Result<Message> {
        let affected = self.conn().execute(
            "UPDATE messages SET favorite = NOT favorite WHERE id = ?1 AND deleted = 0",
            params![id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        self.get_message(id)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Attach edit history and reactions to a bare row.
    fn hydrate(&self, row: MessageRow) -> Result<Message> {
        let id = MessageId(row.id);
        let history = self.edit_history(id)?;
        let reactions = self.reactions_for_message(id)?;
        row.into_message(history, reactions)
    }

    fn edit_history(&self, id: MessageId) -> Result<Vec<EditSnapshot>> {
        let mut stmt = self.conn().prepare(
            "SELECT content, edited_at FROM message_edits
             WHERE message_id = ?1 ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![id.0], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut history = Vec::new();
        for row in rows {
            let (content, edited_at) = row?;
            history.push(EditSnapshot {
                timestamp: parse_ts(&edited_at)?,
                content,
            });
        }
        Ok(history)
    }
}

/// Columns of `messages` before parsing.
struct MessageRow {
    id: i64,
    user_id: i64,
    role: String,
    content: String,
    content_type: String,
    tags: String,
    metadata: String,
    timestamp: String,
    edited: bool,
    deleted: bool,
    favorite: bool,
}

impl MessageRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            content_type: row.get(4)?,
            tags: row.get(5)?,
            metadata: row.get(6)?,
            timestamp: row.get(7)?,
            edited: row.get(8)?,
            deleted: row.get(9)?,
            favorite: row.get(10)?,
        })
    }

    fn into_message(
        self,
        edit_history: Vec<EditSnapshot>,
        reactions: parley_shared::Reactions,
    ) -> Result<Message> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown role {:?}", self.role)))?;
        let content_type = ContentType::parse(&self.content_type).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown content type {:?}", self.content_type))
        })?;
        let tags: BTreeSet<String> = serde_json::from_str(&self.tags)?;
        let metadata: Map<String, Value> = serde_json::from_str(&self.metadata)?;

        Ok(Message {
            id: MessageId(self.id),
            user_id: UserId(self.user_id),
            role,
            content: self.content,
            content_type,
            tags,
            metadata,
            timestamp: parse_ts(&self.timestamp)?,
            edited: self.edited,
            edit_history,
            deleted: self.deleted,
            favorite: self.favorite,
            reactions,
        })
    }
}

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
