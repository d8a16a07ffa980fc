use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parley_shared::UserId;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::connection::{ConnectionHandle, ConnectionId, Liveness, Outbound};

struct Tracked {
    handle: ConnectionHandle,
    user: Option<UserId>,
}

/// Result of one liveness sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub evicted: usize,
}

/// Every open push connection, and the per-user sets used for fan-out.
///
/// Lock order is always `connections` before `users`; no code path holds a
/// `users` guard while touching `connections`.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Tracked>,
    users: DashMap<UserId, HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly opened, not yet authenticated connection.
    pub fn attach(&self, handle: ConnectionHandle) {
        let id = handle.id();
        self.connections.insert(id, Tracked { handle, user: None });
        debug!(connection = %id, "Connection attached");
    }

    /// Associate a connection with `user`, moving it out of any previous
    /// user's set. Returns `false` if the connection was already evicted.
    pub fn register(&self, id: ConnectionId, user: UserId) -> bool {
        let Some(mut tracked) = self.connections.get_mut(&id) else {
            return false;
        };

        if let Some(previous) = tracked.user.replace(user) {
            if previous != user {
                remove_from_set(&self.users, previous, id);
            }
        }

        self.users
            .entry(user)
            .or_default()
            .insert(id, tracked.handle.clone());

        info!(
            connection = %id,
            user = %user,
            users = self.user_count(),
            "Connection registered"
        );
        true
    }

    /// Forget a connection and terminate its socket. Safe to call more than
    /// once.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let Some((_, tracked)) = self.connections.remove(&id) else {
            return false;
        };

        if let Some(user) = tracked.user {
            remove_from_set(&self.users, user, id);
        }
        tracked.handle.terminate();

        debug!(connection = %id, "Connection unregistered");
        true
    }

    /// Drop a misbehaving or unresponsive connection. The socket is torn down
    /// without waiting for pending writes.
    pub fn evict(&self, id: ConnectionId, reason: &'static str) {
        if self.unregister(id) {
            info!(connection = %id, reason, "Evicted connection");
        }
    }

    pub fn mark_alive(&self, id: ConnectionId) {
        if let Some(tracked) = self.connections.get(&id) {
            tracked.handle.mark_alive();
        }
    }

    /// Snapshot of a user's live connections.
    pub fn connections_of(&self, user: UserId) -> Vec<ConnectionHandle> {
        self.users
            .get(&user)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Probe every connection; evict the ones that ignored the previous probe.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut dead = Vec::new();

        for entry in self.connections.iter() {
            let handle = &entry.handle;
            match handle.begin_probe() {
                Liveness::Alive => match handle.send(Outbound::Ping) {
                    Ok(()) => report.probed += 1,
                    Err(_) => dead.push(handle.id()),
                },
                Liveness::AwaitingPong => dead.push(handle.id()),
            }
        }

        for id in dead {
            self.evict(id, "missed heartbeat");
            report.evicted += 1;
        }

        if report.evicted > 0 {
            debug!(
                probed = report.probed,
                evicted = report.evicted,
                remaining = self.tracked_count(),
                "Liveness sweep"
            );
        }
        report
    }

    pub fn connection_count(&self, user: UserId) -> usize {
        self.users.get(&user).map(|set| set.len()).unwrap_or(0)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn tracked_count(&self) -> usize {
        self.connections.len()
    }
}

/// Run [`ConnectionRegistry::sweep`] every `interval` until the task is aborted.
pub fn spawn_liveness_sweep(registry: Arc<ConnectionRegistry>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            registry.sweep();
        }
    })
}

fn remove_from_set(
    users: &DashMap<UserId, HashMap<ConnectionId, ConnectionHandle>>,
    user: UserId,
    id: ConnectionId,
) {
    users.remove_if_mut(&user, |_, set| {
        set.remove(&id);
        set.is_empty()
    });
}
