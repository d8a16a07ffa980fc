//! The [`Message`] entity and the rules every store backend applies when
//! mutating it.
//!
//! Backends own persistence and locking; the invariants themselves (edit
//! history is append-only, reactions are idempotent per user, a soft-deleted
//! message stays stored) live here so that every backend enforces them the
//! same way.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{MAX_CONTENT_LEN, MAX_REACTION_KIND_LEN, MAX_TAGS, MAX_TAG_LEN};
use crate::error::ValidationError;
use crate::types::{ContentType, MessageId, Role, UserId};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One turn in a user's conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    /// Owner. Never changes after creation.
    pub user_id: UserId,
    pub role: Role,
    pub content: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Creation time. Never changes after creation.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
    /// Prior contents, oldest first. Appended on every edit.
    #[serde(default)]
    pub edit_history: Vec<EditSnapshot>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub reactions: Reactions,
}

/// Content that was live before an edit replaced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditSnapshot {
    /// When the edit that retired this content happened.
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl Message {
    /// Replace the content, archiving the previous one in `edit_history`.
    pub fn apply_edit(
        &mut self,
        content: String,
        at: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        validate_content(&content)?;
        let previous = std::mem::replace(&mut self.content, content);
        self.edit_history.push(EditSnapshot {
            timestamp: at,
            content: previous,
        });
        self.edited = true;
        Ok(())
    }

    /// Set the soft-delete flag. Returns `false` if it was already set.
    pub fn mark_deleted(&mut self) -> bool {
        !std::mem::replace(&mut self.deleted, true)
    }

    /// Flip the favorite flag and return the new value.
    pub fn toggle_favorite(&mut self) -> bool {
        self.favorite = !self.favorite;
        self.favorite
    }

    /// Whether normal reads (history, search, filters) may return it.
    pub fn is_visible(&self) -> bool {
        !self.deleted
    }
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

/// Reaction aggregate. `count` always equals the number of distinct users.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawReactions")]
pub struct Reactions {
    count: u32,
    users: BTreeSet<UserId>,
}

#[derive(Deserialize)]
struct RawReactions {
    #[serde(default)]
    users: BTreeSet<UserId>,
}

impl From<RawReactions> for Reactions {
    fn from(raw: RawReactions) -> Self {
        Self::from_users(raw.users)
    }
}

impl Reactions {
    pub fn from_users(users: BTreeSet<UserId>) -> Self {
        Self {
            count: users.len() as u32,
            users,
        }
    }

    /// Record a reaction. Returns `false` if `user` had already reacted.
    pub fn add(&mut self, user: UserId) -> bool {
        let inserted = self.users.insert(user);
        if inserted {
            self.count += 1;
        }
        inserted
    }

    /// Withdraw a reaction. Returns `false` if `user` had not reacted.
    pub fn remove(&mut self, user: UserId) -> bool {
        let removed = self.users.remove(&user);
        if removed {
            self.count -= 1;
        }
        removed
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn users(&self) -> &BTreeSet<UserId> {
        &self.users
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.users.contains(&user)
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Input for creating a message. Validated by [`NewMessage::into_message`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub user_id: UserId,
    pub role: Role,
    pub content: String,
    pub content_type: ContentType,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
}

impl NewMessage {
    pub fn new(user_id: UserId, role: Role, content: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            content: content.into(),
            content_type: ContentType::Text,
            tags: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate the input and build a fresh entity with the given identity.
    pub fn into_message(
        self,
        id: MessageId,
        timestamp: DateTime<Utc>,
    ) -> Result<Message, ValidationError> {
        validate_content(&self.content)?;
        let tags = normalize_tags(self.tags)?;

        Ok(Message {
            id,
            user_id: self.user_id,
            role: self.role,
            content: self.content,
            content_type: self.content_type,
            tags,
            metadata: self.metadata,
            timestamp,
            edited: false,
            edit_history: Vec::new(),
            deleted: false,
            favorite: false,
            reactions: Reactions::default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    if content.len() > MAX_CONTENT_LEN {
        return Err(ValidationError::ContentTooLarge {
            size: content.len(),
            max: MAX_CONTENT_LEN,
        });
    }
    Ok(())
}

/// Trim tags and collapse duplicates.
pub fn normalize_tags<I, S>(tags: I) -> Result<BTreeSet<String>, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeSet::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            return Err(ValidationError::EmptyTag);
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(ValidationError::TagTooLong(tag.to_string()));
        }
        out.insert(tag.to_string());
    }
    if out.len() > MAX_TAGS {
        return Err(ValidationError::TooManyTags {
            count: out.len(),
            max: MAX_TAGS,
        });
    }
    Ok(out)
}

/// Trim a reaction kind and check its length.
pub fn normalize_reaction_kind(kind: &str) -> Result<String, ValidationError> {
    let kind = kind.trim();
    if kind.is_empty() || kind.len() > MAX_REACTION_KIND_LEN {
        return Err(ValidationError::InvalidReactionKind {
            max: MAX_REACTION_KIND_LEN,
        });
    }
    Ok(kind.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        NewMessage::new(UserId(1), Role::User, "hi")
            .into_message(MessageId(1), Utc::now())
            .unwrap()
    }

    #[test]
    fn test_new_message_defaults() {
        let msg = sample();
        assert_eq!(msg.content, "hi");
        assert!(!msg.edited);
        assert!(!msg.deleted);
        assert!(!msg.favorite);
        assert_eq!(msg.reactions.count(), 0);
        assert!(msg.edit_history.is_empty());
        assert_eq!(msg.content_type, ContentType::Text);
    }

    #[test]
    fn test_edits_archive_prior_content() {
        let mut msg = sample();
        let edits = ["one", "two", "three"];
        let mut live = vec![msg.content.clone()];

        for edit in edits {
            msg.apply_edit(edit.to_string(), Utc::now()).unwrap();
            live.push(edit.to_string());
        }

        assert_eq!(msg.edit_history.len(), edits.len());
        for (k, snapshot) in msg.edit_history.iter().enumerate() {
            assert_eq!(snapshot.content, live[k]);
        }
        assert_eq!(msg.content, "three");
        assert!(msg.edited);
        assert!(msg.edit_history.iter().all(|s| s.content != msg.content));
    }

    #[test]
    fn test_rejected_edit_leaves_message_untouched() {
        let mut msg = sample();
        let err = msg.apply_edit("   ".to_string(), Utc::now()).unwrap_err();
        assert_eq!(err, ValidationError::EmptyContent);
        assert_eq!(msg.content, "hi");
        assert!(!msg.edited);
        assert!(msg.edit_history.is_empty());
    }

    #[test]
    fn test_mark_deleted_is_idempotent() {
        let mut msg = sample();
        assert!(msg.mark_deleted());
        assert!(!msg.mark_deleted());
        assert!(msg.deleted);
        assert!(!msg.is_visible());
    }

    #[test]
    fn test_reactions_are_idempotent_per_user() {
        let mut reactions = Reactions::default();
        assert!(reactions.add(UserId(1)));
        assert!(!reactions.add(UserId(1)));
        assert_eq!(reactions.count(), 1);
        assert_eq!(reactions.users().len(), 1);

        assert!(!reactions.remove(UserId(2)));
        assert_eq!(reactions.count(), 1);

        assert!(reactions.remove(UserId(1)));
        assert!(!reactions.remove(UserId(1)));
        assert_eq!(reactions.count(), 0);
    }

    #[test]
    fn test_reactions_count_recomputed_on_deserialize() {
        let reactions: Reactions =
            serde_json::from_str(r#"{"count": 99, "users": [3, 1, 3]}"#).unwrap();
        assert_eq!(reactions.count(), 2);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let mut msg = sample();
        msg.apply_edit("hello".to_string(), Utc::now()).unwrap();
        msg.reactions.add(UserId(1));

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["userId"], 1);
        assert_eq!(value["contentType"], "text");
        assert_eq!(value["editHistory"][0]["content"], "hi");
        assert_eq!(value["reactions"]["count"], 1);
        assert_eq!(value["reactions"]["users"][0], 1);
    }

    #[test]
    fn test_tag_normalization() {
        let tags = normalize_tags([" rust ", "rust", "async"]).unwrap();
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["async", "rust"]);
        assert_eq!(normalize_tags([" "]).unwrap_err(), ValidationError::EmptyTag);
    }

    #[test]
    fn test_content_limits() {
        let big = "x".repeat(MAX_CONTENT_LEN + 1);
        assert!(matches!(
            validate_content(&big),
            Err(ValidationError::ContentTooLarge { .. })
        ));
        assert!(normalize_reaction_kind("").is_err());
        assert_eq!(normalize_reaction_kind(" 👍 ").unwrap(), "👍");
    }
}
