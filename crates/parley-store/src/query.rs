//! Read-side filters shared by every backend.
//!
//! Backends only fetch a user's messages; visibility, matching and ordering
//! are decided here so that memory and SQLite answer every query the same way.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use parley_shared::message::normalize_tags;
use parley_shared::{Message, ValidationError};

/// A query over one user's conversation. Soft-deleted messages never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageQuery {
    /// Every visible message, oldest first.
    History,
    /// Case-insensitive substring match on content, newest first.
    Search(String),
    /// Messages created within `[start, end]`, newest first.
    DateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Messages carrying at least one of the tags, newest first.
    Tags(Vec<String>),
    /// Favorited messages, newest first.
    Favorites,
}

impl MessageQuery {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Search(q) if q.trim().is_empty() => Err(ValidationError::EmptyQuery),
            Self::DateRange { start, end } if start > end => Err(ValidationError::InvertedRange),
            Self::Tags(tags) => {
                if normalize_tags(tags)?.is_empty() {
                    Err(ValidationError::NoTags)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Filter and order a user's messages. Call [`validate`](Self::validate)
    /// first; an invalid query simply matches nothing here.
    pub fn apply(&self, messages: Vec<Message>) -> Vec<Message> {
        let mut out: Vec<Message> = match self {
            Self::History => messages.into_iter().filter(Message::is_visible).collect(),
            Self::Search(q) => {
                let needle = q.trim().to_lowercase();
                messages
                    .into_iter()
                    .filter(|m| m.is_visible() && m.content.to_lowercase().contains(&needle))
                    .collect()
            }
            Self::DateRange { start, end } => messages
                .into_iter()
                .filter(|m| m.is_visible() && m.timestamp >= *start && m.timestamp <= *end)
                .collect(),
            Self::Tags(tags) => {
                let wanted = normalize_tags(tags).unwrap_or_default();
                messages
                    .into_iter()
                    .filter(|m| m.is_visible() && !m.tags.is_disjoint(&wanted))
                    .collect()
            }
            Self::Favorites => messages
                .into_iter()
                .filter(|m| m.is_visible() && m.favorite)
                .collect(),
        };

        match self {
            Self::History => out.sort_by(chronological),
            _ => out.sort_by(|a, b| chronological(b, a)),
        }
        out
    }
}

// Creation time, ties broken by id (ids are assigned monotonically).
fn chronological(a: &Message, b: &Message) -> Ordering {
    a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id))
}
