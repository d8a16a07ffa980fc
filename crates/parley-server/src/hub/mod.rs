//! Real-time fan-out of message events to a user's open push connections.
//!
//! - [`connection`]: per-connection outbound queue and heartbeat state
//! - [`registry`]: which connections are open and which user each belongs to
//! - [`router`]: serializes an event once and enqueues it on every connection

pub mod connection;
pub mod registry;
pub mod router;

pub use connection::{ConnectionHandle, ConnectionId, Outbound};
pub use registry::{spawn_liveness_sweep, ConnectionRegistry};
pub use router::Broadcaster;
