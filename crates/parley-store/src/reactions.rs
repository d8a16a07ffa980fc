use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use parley_shared::{MessageId, Reactions, UserId};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::format_ts;

impl Database {
    /// Record `user`'s reaction. Returns `false` if the user had already
    /// reacted to this message (the existing row is kept as is).
    pub fn add_reaction(
        &self,
        message_id: MessageId,
        user: UserId,
        kind: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.ensure_live_message(message_id)?;

        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO reactions (message_id, user_id, kind, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![message_id.0, user.0, kind, format_ts(&at)],
        )?;
        Ok(inserted > 0)
    }

    /// Withdraw `user`'s reaction. Returns `false` if there was none.
    pub fn remove_reaction(&self, message_id: MessageId, user: UserId) -> Result<bool> {
        self.ensure_live_message(message_id)?;

        let affected = self.conn().execute(
            "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2",
            params![message_id.0, user.0],
        )?;
        Ok(affected > 0)
    }

    /// Aggregate of everyone who reacted to a message.
    pub fn reactions_for_message(&self, message_id: MessageId) -> Result<Reactions> {
        let mut stmt = self
            .conn()
            .prepare("SELECT user_id FROM reactions WHERE message_id = ?1")?;

        let rows = stmt.query_map(params![message_id.0], |row| row.get::<_, i64>(0))?;

        let mut users = BTreeSet::new();
        for row in rows {
            users.insert(UserId(row?));
        }
        Ok(Reactions::from_users(users))
    }

    /// The kind `user` reacted with, if any.
    pub fn reaction_kind(&self, message_id: MessageId, user: UserId) -> Result<Option<String>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT kind FROM reactions WHERE message_id = ?1 AND user_id = ?2",
                params![message_id.0, user.0],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Reactions only apply to messages that exist and are not soft-deleted.
    fn ensure_live_message(&self, id: MessageId) -> Result<()> {
        self.conn()
            .query_row(
                "SELECT 1 FROM messages WHERE id = ?1 AND deleted = 0",
                params![id.0],
                |_| Ok(()),
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_shared::{NewMessage, Role};

    #[test]
    fn test_insert_or_ignore_keeps_first_kind() {
        let db = Database::open_in_memory().unwrap();
        let msg = db
            .insert_message(NewMessage::new(UserId(1), Role::User, "hi"), Utc::now())
            .unwrap();

        assert!(db.add_reaction(msg.id, UserId(1), "👍", Utc::now()).unwrap());
        assert!(!db.add_reaction(msg.id, UserId(1), "🎉", Utc::now()).unwrap());

        assert_eq!(db.reactions_for_message(msg.id).unwrap().count(), 1);
        assert_eq!(
            db.reaction_kind(msg.id, UserId(1)).unwrap().as_deref(),
            Some("👍")
        );
    }

    #[test]
    fn test_remove_absent_reaction() {
        let db = Database::open_in_memory().unwrap();
        let msg = db
            .insert_message(NewMessage::new(UserId(1), Role::User, "hi"), Utc::now())
            .unwrap();

        assert!(!db.remove_reaction(msg.id, UserId(9)).unwrap());
        assert_eq!(db.reactions_for_message(msg.id).unwrap().count(), 0);
    }

    #[test]
    fn test_reaction_on_deleted_message() {
        let db = Database::open_in_memory().unwrap();
        let msg = db
            .insert_message(NewMessage::new(UserId(1), Role::User, "hi"), Utc::now())
            .unwrap();
        db.add_reaction(msg.id, UserId(2), "👍", Utc::now()).unwrap();
        db.soft_delete_message(msg.id).unwrap();

        assert!(matches!(
            db.add_reaction(msg.id, UserId(1), "👍", Utc::now()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            db.remove_reaction(msg.id, UserId(2)),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(db.reactions_for_message(msg.id).unwrap().count(), 1);
    }

    #[test]
    fn test_reaction_on_missing_message() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.add_reaction(MessageId(7), UserId(1), "👍", Utc::now()),
            Err(StoreError::NotFound(MessageId(7)))
        ));
    }
}
