//! # parley-store
//!
//! Message storage for Parley. The [`MessageStore`] trait is the async
//! contract the server talks to; two backends implement it:
//!
//! - [`MemoryStore`] keeps everything in process memory, with one lock per
//!   message so unrelated messages never contend.
//! - [`SqliteStore`] persists to SQLite through the synchronous [`Database`]
//!   handle, which wraps a `rusqlite::Connection` and runs schema migrations
//!   on open.

pub mod database;
pub mod memory;
pub mod messages;
pub mod migrations;
pub mod query;
pub mod reactions;
pub mod sqlite;
pub mod store;

mod error;

#[cfg(test)]
mod conformance;

pub use database::Database;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use query::MessageQuery;
pub use sqlite::SqliteStore;
pub use store::MessageStore;
