//! # parley-shared
//!
//! Types shared by the Parley store and server: identifiers, the [`Message`]
//! entity together with its mutation rules, and the push-channel event
//! protocol.

pub mod constants;
pub mod error;
pub mod message;
pub mod protocol;
pub mod types;

pub use error::ValidationError;
pub use message::{EditSnapshot, Message, NewMessage, Reactions};
pub use protocol::{InboundEvent, OutboundEvent};
pub use types::{ContentType, MessageId, Role, UserId};
