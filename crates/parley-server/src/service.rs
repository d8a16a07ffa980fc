//! Message operations as seen by an authenticated user.
//!
//! Every mutation goes to the store first; only a successful result is
//! published to the owner's connections. Broadcast problems never reach the
//! caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_shared::message::validate_content;
use parley_shared::{Message, MessageId, NewMessage, OutboundEvent, Role, UserId};
use parley_store::MessageStore;
use tracing::{debug, info};

use crate::completion::{Completer, Turn};
use crate::error::ApiError;
use crate::hub::Broadcaster;

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub response: String,
    pub user_message: Message,
    pub assistant_message: Message,
}

pub struct ChatService {
    store: Arc<dyn MessageStore>,
    broadcaster: Broadcaster,
    completer: Arc<dyn Completer>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        broadcaster: Broadcaster,
        completer: Arc<dyn Completer>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            completer,
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub async fn create(&self, new: NewMessage) -> Result<Message, ApiError> {
        let message = self.store.create(new).await?;
        self.announce(&message);
        Ok(message)
    }

    pub async fn edit(
        &self,
        user: UserId,
        id: MessageId,
        content: String,
    ) -> Result<Message, ApiError> {
        self.live(user, id).await?;
        let message = self.store.edit(id, content).await?;
        self.announce(&message);
        Ok(message)
    }

    /// Soft-delete. Repeating it succeeds and announces the deletion again.
    pub async fn delete(&self, user: UserId, id: MessageId) -> Result<MessageId, ApiError> {
        self.owned(user, id).await?;
        let message = self.store.soft_delete(id).await?;
        let report = self
            .broadcaster
            .publish(user, &OutboundEvent::MessageDelete { id: message.id });
        info!(
            user = %user,
            message = %id,
            delivered = report.delivered,
            "Message deleted"
        );
        Ok(message.id)
    }

    pub async fn toggle_favorite(&self, user: UserId, id: MessageId) -> Result<Message, ApiError> {
        self.live(user, id).await?;
        let message = self.store.toggle_favorite(id).await?;
        self.announce(&message);
        Ok(message)
    }

    pub async fn add_reaction(
        &self,
        user: UserId,
        id: MessageId,
        kind: &str,
    ) -> Result<Message, ApiError> {
        self.live(user, id).await?;
        let message = self.store.add_reaction(id, user, kind).await?;
        self.announce(&message);
        Ok(message)
    }

    pub async fn remove_reaction(
        &self,
        user: UserId,
        id: MessageId,
        kind: &str,
    ) -> Result<Message, ApiError> {
        self.live(user, id).await?;
        let message = self.store.remove_reaction(id, user, kind).await?;
        self.announce(&message);
        Ok(message)
    }

    /// Generate an assistant reply to `text` given the user's history. Both
    /// turns are stored together, and announced, only once the reply exists.
    pub async fn chat(&self, user: UserId, text: String) -> Result<ChatExchange, ApiError> {
        validate_content(&text)?;

        let history = self.store.list_for_user(user).await?;
        let mut turns: Vec<Turn> = history
            .into_iter()
            .map(|m| Turn::new(m.role, m.content))
            .collect();
        turns.push(Turn::new(Role::User, text.clone()));

        let response = self.completer.complete(&turns).await?;
        debug!(user = %user, turns = turns.len(), "Completion received");

        let (user_message, assistant_message) = self
            .store
            .create_pair(
                NewMessage::new(user, Role::User, text),
                NewMessage::new(user, Role::Assistant, response.clone()),
            )
            .await?;
        self.announce(&user_message);
        self.announce(&assistant_message);

        Ok(ChatExchange {
            response,
            user_message,
            assistant_message,
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get(&self, user: UserId, id: MessageId) -> Result<Message, ApiError> {
        self.live(user, id).await
    }

    pub async fn history(&self, user: UserId) -> Result<Vec<Message>, ApiError> {
        Ok(self.store.list_for_user(user).await?)
    }

    pub async fn search(&self, user: UserId, text: &str) -> Result<Vec<Message>, ApiError> {
        Ok(self.store.search(user, text).await?)
    }

    pub async fn by_date_range(
        &self,
        user: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Message>, ApiError> {
        Ok(self.store.by_date_range(user, start, end).await?)
    }

    pub async fn by_tags(&self, user: UserId, tags: &[String]) -> Result<Vec<Message>, ApiError> {
        Ok(self.store.by_tags(user, tags).await?)
    }

    pub async fn favorites(&self, user: UserId) -> Result<Vec<Message>, ApiError> {
        Ok(self.store.favorites_of(user).await?)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// The message, if `user` owns it. Someone else's message is reported as
    /// missing.
    async fn owned(&self, user: UserId, id: MessageId) -> Result<Message, ApiError> {
        let message = self.store.get(id).await?;
        if message.user_id != user {
            return Err(not_found(id));
        }
        Ok(message)
    }

    /// Like [`owned`](Self::owned), but soft-deleted messages are missing too.
    ///
    /// Only a pre-check: the owner never changes, but a delete may land before
    /// the mutation, so the store repeats the deleted check under its lock.
    async fn live(&self, user: UserId, id: MessageId) -> Result<Message, ApiError> {
        let message = self.owned(user, id).await?;
        if message.deleted {
            return Err(not_found(id));
        }
        Ok(message)
    }

    fn announce(&self, message: &Message) {
        let report = self
            .broadcaster
            .publish(message.user_id, &OutboundEvent::MessageUpdate(message.clone()));
        if report.evicted > 0 {
            debug!(
                message = %message.id,
                delivered = report.delivered,
                evicted = report.evicted,
                "Update delivered with evictions"
            );
        }
    }
}

fn not_found(id: MessageId) -> ApiError {
    ApiError::NotFound(format!("Message not found: {id}"))
}
