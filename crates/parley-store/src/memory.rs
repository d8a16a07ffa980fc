//! In-process [`MessageStore`] backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parley_shared::message::normalize_reaction_kind;
use parley_shared::{Message, MessageId, NewMessage, UserId, ValidationError};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::query::MessageQuery;
use crate::store::MessageStore;

type Slot = Arc<Mutex<Message>>;

/// Messages held in memory. The maps are only locked long enough to find a
/// message's slot; field mutations then happen under that message's own lock,
/// so writers on different messages never wait on each other.
pub struct MemoryStore {
    next_id: AtomicI64,
    messages: RwLock<HashMap<MessageId, Slot>>,
    /// Per-user index in insertion order.
    by_user: RwLock<HashMap<UserId, Vec<MessageId>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            messages: RwLock::new(HashMap::new()),
            by_user: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    async fn slot(&self, id: MessageId) -> Result<Slot> {
        self.messages
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Apply `f` under the message's lock and return the updated entity.
    async fn mutate<F>(&self, id: MessageId, f: F) -> Result<Message>
    where
        F: FnOnce(&mut Message) -> std::result::Result<(), ValidationError> + Send,
    {
        let slot = self.slot(id).await?;
        let mut message = slot.lock().await;
        f(&mut message)?;
        Ok(message.clone())
    }

    /// Like [`mutate`](Self::mutate), but a soft-deleted message is missing.
    async fn mutate_live<F>(&self, id: MessageId, f: F) -> Result<Message>
    where
        F: FnOnce(&mut Message) -> std::result::Result<(), ValidationError> + Send,
    {
        let slot = self.slot(id).await?;
        let mut message = slot.lock().await;
        if message.deleted {
            return Err(StoreError::NotFound(id));
        }
        f(&mut message)?;
        Ok(message.clone())
    }

    /// Make validated messages visible. Both maps stay locked for the whole
    /// batch, so readers see all of it or none of it.
    async fn insert(&self, batch: &[Message]) {
        let mut messages = self.messages.write().await;
        let mut by_user = self.by_user.write().await;
        for message in batch {
            // The slot must exist before the index points at it.
            messages.insert(message.id, Arc::new(Mutex::new(message.clone())));
            by_user.entry(message.user_id).or_default().push(message.id);
            debug!(message = %message.id, user = %message.user_id, "Stored message");
        }
    }

    fn next_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, new: NewMessage) -> Result<Message> {
        let message = new.into_message(self.next_id(), Utc::now())?;
        self.insert(std::slice::from_ref(&message)).await;
        Ok(message)
    }

    async fn create_pair(
        &self,
        first: NewMessage,
        second: NewMessage,
    ) -> Result<(Message, Message)> {
        let now = Utc::now();
        let first = first.into_message(self.next_id(), now)?;
        let second = second.into_message(self.next_id(), now)?;
        self.insert(&[first.clone(), second.clone()]).await;
        Ok((first, second))
    }

    async fn edit(&self, id: MessageId, content: String) -> Result<Message> {
        self.mutate_live(id, |m| m.apply_edit(content, Utc::now())).await
    }

    async fn soft_delete(&self, id: MessageId) -> Result<Message> {
        self.mutate(id, |m| {
            m.mark_deleted();
            Ok(())
        })
        .await
    }

    async fn toggle_favorite(&self, id: MessageId) -> Result<Message> {
        self.mutate_live(id, |m| {
            m.toggle_favorite();
            Ok(())
        })
        .await
    }

    async fn add_reaction(&self, id: MessageId, user: UserId, kind: &str) -> Result<Message> {
        normalize_reaction_kind(kind)?;
        self.mutate_live(id, |m| {
            m.reactions.add(user);
            Ok(())
        })
        .await
    }

    async fn remove_reaction(&self, id: MessageId, user: UserId, kind: &str) -> Result<Message> {
        normalize_reaction_kind(kind)?;
        self.mutate_live(id, |m| {
            m.reactions.remove(user);
            Ok(())
        })
        .await
    }

    async fn get(&self, id: MessageId) -> Result<Message> {
        let slot = self.slot(id).await?;
        let message = slot.lock().await;
        Ok(message.clone())
    }

    async fn query(&self, user: UserId, query: MessageQuery) -> Result<Vec<Message>> {
        query.validate()?;

        let ids = match self.by_user.read().await.get(&user) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };

        let slots: Vec<Slot> = {
            let messages = self.messages.read().await;
            ids.iter().filter_map(|id| messages.get(id).cloned()).collect()
        };

        let mut snapshot = Vec::with_capacity(slots.len());
        for slot in slots {
            snapshot.push(slot.lock().await.clone());
        }

        Ok(query.apply(snapshot))
    }
}
