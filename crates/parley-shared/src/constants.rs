/// Path of the push channel endpoint
pub const PUSH_PATH: &str = "/ws";

/// Interval between two liveness sweeps in seconds
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Outbound frames buffered per connection before it counts as stalled
pub const CONNECTION_BUFFER: usize = 256;

/// Maximum message content size in bytes (32 KiB)
pub const MAX_CONTENT_LEN: usize = 32 * 1024;

/// Maximum number of tags on a single message
pub const MAX_TAGS: usize = 32;

/// Maximum size of a single tag in bytes
pub const MAX_TAG_LEN: usize = 64;

/// Maximum size of a reaction kind in bytes
pub const MAX_REACTION_KIND_LEN: usize = 32;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Reply used when the completion provider returns no text
pub const FALLBACK_REPLY: &str = "I couldn't generate a response.";
