use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity of one open push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Heartbeat state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Answered the last probe (or has not been probed yet).
    Alive,
    /// Probed, no pong seen since.
    AwaitingPong,
}

/// Frames queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A pre-serialized `{event, data}` envelope.
    Event(Arc<str>),
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    #[error("connection closed")]
    Closed,

    #[error("outbound buffer full")]
    Backpressure,
}

/// Sending side of a connection, owned by the registry.
///
/// The writer task owns the matching receiver. [`terminate`](Self::terminate)
/// tells the socket task to drop the connection at once, whatever its writer
/// is blocked on.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    awaiting_pong: Arc<AtomicBool>,
    terminated: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            tx,
            awaiting_pong: Arc::new(AtomicBool::new(false)),
            terminated: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Enqueue without waiting. A full queue means the peer is not keeping up.
    pub fn send(&self, frame: Outbound) -> Result<(), DeliveryFailure> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryFailure::Backpressure,
            mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }

    pub fn terminate(&self) {
        self.terminated.cancel();
    }

    /// Fires once [`terminate`](Self::terminate) is called on any clone.
    pub fn terminated(&self) -> CancellationToken {
        self.terminated.clone()
    }

    pub fn mark_alive(&self) {
        self.awaiting_pong.store(false, Ordering::Release);
    }

    /// Move to `AwaitingPong`, returning the state before the probe.
    pub fn begin_probe(&self) -> Liveness {
        if self.awaiting_pong.swap(true, Ordering::AcqRel) {
            Liveness::AwaitingPong
        } else {
            Liveness::Alive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_cycle() {
        let (handle, _rx) = ConnectionHandle::new(4);

        assert_eq!(handle.begin_probe(), Liveness::Alive);
        assert_eq!(handle.begin_probe(), Liveness::AwaitingPong);

        handle.mark_alive();
        assert_eq!(handle.begin_probe(), Liveness::Alive);
    }

    #[test]
    fn test_send_reports_backpressure_and_close() {
        let (handle, rx) = ConnectionHandle::new(1);
        assert!(handle.send(Outbound::Ping).is_ok());
        assert_eq!(handle.send(Outbound::Ping), Err(DeliveryFailure::Backpressure));

        drop(rx);
        assert_eq!(handle.send(Outbound::Ping), Err(DeliveryFailure::Closed));
    }

    #[tokio::test]
    async fn test_terminate_reaches_every_clone() {
        let (handle, _rx) = ConnectionHandle::new(1);
        let signal = handle.terminated();
        assert!(!signal.is_cancelled());

        handle.clone().terminate();
        tokio::time::timeout(std::time::Duration::from_secs(1), signal.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _) = ConnectionHandle::new(1);
        let (b, _) = ConnectionHandle::new(1);
        assert_ne!(a.id(), b.id());
    }
}
