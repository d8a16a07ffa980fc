//! SQLite-backed [`MessageStore`].
//!
//! `rusqlite` is synchronous, so every operation runs on the blocking pool
//! while holding the connection lock. That lock is per store, not per
//! message: a `Connection` is not `Sync`, and SQLite already admits a single
//! writer per database file. Each operation is one statement or one
//! transaction, so a change to a message and the checks it depends on are
//! never interleaved with another writer.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use parley_shared::message::normalize_reaction_kind;
use parley_shared::{Message, MessageId, NewMessage, UserId};
use tracing::debug;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::query::MessageQuery;
use crate::store::MessageStore;

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Database::open_at(path).map(Self::new)
    }

    pub fn open_in_memory() -> Result<Self> {
        Database::open_in_memory().map(Self::new)
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn create(&self, new: NewMessage) -> Result<Message> {
        let message = self.run(move |db| db.insert_message(new, Utc::now())).await?;
        debug!(message = %message.id, user = %message.user_id, "Stored message");
        Ok(message)
    }

    async fn create_pair(
        &self,
        first: NewMessage,
        second: NewMessage,
    ) -> Result<(Message, Message)> {
        let (first, second) = self
            .run(move |db| db.insert_message_pair(first, second, Utc::now()))
            .await?;
        debug!(
            first = %first.id,
            second = %second.id,
            user = %first.user_id,
            "Stored message pair"
        );
        Ok((first, second))
    }

    async fn edit(&self, id: MessageId, content: String) -> Result<Message> {
        self.run(move |db| db.edit_message(id, &content, Utc::now()))
            .await
    }

    async fn soft_delete(&self, id: MessageId) -> Result<Message> {
        self.run(move |db| db.soft_delete_message(id)).await
    }

    async fn toggle_favorite(&self, id: MessageId) -> Result<Message> {
        self.run(move |db| db.toggle_favorite(id)).await
    }

    async fn add_reaction(&self, id: MessageId, user: UserId, kind: &str) -> Result<Message> {
        let kind = normalize_reaction_kind(kind)?;
        self.run(move |db| {
            db.add_reaction(id, user, &kind, Utc::now())?;
            db.get_message(id)
        })
        .await
    }

    async fn remove_reaction(&self, id: MessageId, user: UserId, kind: &str) -> Result<Message> {
        normalize_reaction_kind(kind)?;
        self.run(move |db| {
            db.remove_reaction(id, user)?;
            db.get_message(id)
        })
        .await
    }

    async fn get(&self, id: MessageId) -> Result<Message> {
        self.run(move |db| db.get_message(id)).await
    }

    async fn query(&self, user: UserId, query: MessageQuery) -> Result<Vec<Message>> {
        query.validate()?;
        let messages = self
            .run(move |db| db.visible_messages_for_user(user))
            .await?;
        Ok(query.apply(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;
    use parley_shared::Role;

    #[tokio::test]
    async fn test_conformance_suite() {
        conformance::run_all(|| async { SqliteStore::open_in_memory().unwrap() }).await;
    }

    #[tokio::test]
    async fn test_concurrent_writers_share_one_connection() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for i in 0..8 {
            let msg = store
                .create(NewMessage::new(UserId(1), Role::User, format!("m{i}")))
                .await
                .unwrap();
            ids.push(msg.id);
        }

        let mut handles = Vec::new();
        for (i, id) in ids.iter().copied().enumerate() {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.edit(id, format!("edited {i}")).await.unwrap();
                for user in 0..5 {
                    store.add_reaction(id, UserId(user), "+1").await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        for id in ids {
            let msg = store.get(id).await.unwrap();
            assert_eq!(msg.edit_history.len(), 1);
            assert_eq!(msg.reactions.count(), 5);
        }
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            let msg = store
                .create(NewMessage::new(UserId(1), Role::User, "hi"))
                .await
                .unwrap();
            store.edit(msg.id, "hello".into()).await.unwrap();
            store.add_reaction(msg.id, UserId(1), "👍").await.unwrap();
            msg.id
        };

        let store = SqliteStore::open(&path).unwrap();
        let msg = store.get(id).await.unwrap();
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.edit_history.len(), 1);
        assert_eq!(msg.reactions.count(), 1);
    }
}
