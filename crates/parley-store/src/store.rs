use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_shared::{Message, MessageId, NewMessage, UserId};

use crate::error::Result;
use crate::query::MessageQuery;

/// Async contract between the server and a message backend.
///
/// Every mutation returns the entity as it stands after the change so the
/// caller can broadcast it without a second read. Operations addressed to an
/// unknown id fail with [`StoreError::NotFound`](crate::StoreError::NotFound).
/// Edits, favorites and reactions treat a soft-deleted message as unknown;
/// the check happens under the same lock as the change itself.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message and return it with its assigned id.
    async fn create(&self, new: NewMessage) -> Result<Message>;

    /// Persist two messages together: either both are stored, in order, or
    /// neither is.
    async fn create_pair(
        &self,
        first: NewMessage,
        second: NewMessage,
    ) -> Result<(Message, Message)>;

    /// Replace the content, archiving the previous content in the history.
    async fn edit(&self, id: MessageId, content: String) -> Result<Message>;

    /// Set the soft-delete flag. Deleting twice is not an error.
    async fn soft_delete(&self, id: MessageId) -> Result<Message>;

    async fn toggle_favorite(&self, id: MessageId) -> Result<Message>;

    /// No-op if `user` already reacted.
    async fn add_reaction(&self, id: MessageId, user: UserId, kind: &str) -> Result<Message>;

    /// No-op if `user` has not reacted.
    async fn remove_reaction(&self, id: MessageId, user: UserId, kind: &str) -> Result<Message>;

    /// Fetch by id, including soft-deleted messages.
    async fn get(&self, id: MessageId) -> Result<Message>;

    /// Run a validated query over one user's messages.
    async fn query(&self, user: UserId, query: MessageQuery) -> Result<Vec<Message>>;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Message>> {
        self.query(user, MessageQuery::History).await
    }

    async fn search(&self, user: UserId, text: &str) -> Result<Vec<Message>> {
        self.query(user, MessageQuery::Search(text.to_string())).await
    }

    async fn by_date_range(
        &self,
        user: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        self.query(user, MessageQuery::DateRange { start, end }).await
    }

    async fn by_tags(&self, user: UserId, tags: &[String]) -> Result<Vec<Message>> {
        self.query(user, MessageQuery::Tags(tags.to_vec())).await
    }

    async fn favorites_of(&self, user: UserId) -> Result<Vec<Message>> {
        self.query(user, MessageQuery::Favorites).await
    }
}
