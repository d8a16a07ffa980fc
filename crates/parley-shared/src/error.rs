use thiserror::Error;

/// Malformed mutation or query input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message content must not be empty")]
    EmptyContent,

    #[error("Message content too large: {size} bytes (max {max})")]
    ContentTooLarge { size: usize, max: usize },

    #[error("Tags must not be empty")]
    EmptyTag,

    #[error("Tag too long: {0}")]
    TagTooLong(String),

    #[error("Too many tags: {count} (max {max})")]
    TooManyTags { count: usize, max: usize },

    #[error("Reaction kind must be 1 to {max} bytes")]
    InvalidReactionKind { max: usize },

    #[error("Search query must not be empty")]
    EmptyQuery,

    #[error("At least one tag is required")]
    NoTags,

    #[error("Date range start is after its end")]
    InvertedRange,
}
