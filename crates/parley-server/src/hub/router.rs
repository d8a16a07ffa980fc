use std::sync::Arc;

use parley_shared::{OutboundEvent, UserId};
use tracing::{debug, error};

use super::connection::{ConnectionId, Outbound};
use super::registry::ConnectionRegistry;

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Pushes events to every live connection of a user.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `event` to all of `user`'s connections. Never fails: a
    /// connection that cannot take the frame is evicted instead.
    pub fn publish(&self, user: UserId, event: &OutboundEvent) -> DeliveryReport {
        self.fan_out(user, None, event)
    }

    /// Like [`publish`](Self::publish), skipping the `excluded` connection.
    pub fn publish_except(
        &self,
        user: UserId,
        excluded: ConnectionId,
        event: &OutboundEvent,
    ) -> DeliveryReport {
        self.fan_out(user, Some(excluded), event)
    }

    fn fan_out(
        &self,
        user: UserId,
        excluded: Option<ConnectionId>,
        event: &OutboundEvent,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let targets = self.registry.connections_of(user);
        if targets.is_empty() {
            return report;
        }

        let frame: Arc<str> = match event.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                error!(user = %user, event = event.name(), error = %e, "Failed to encode event");
                return report;
            }
        };

        for handle in targets {
            if Some(handle.id()) == excluded {
                continue;
            }
            match handle.send(Outbound::Event(frame.clone())) {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    debug!(
                        user = %user,
                        connection = %handle.id(),
                        error = %failure,
                        "Delivery failed"
                    );
                    self.registry.evict(handle.id(), "delivery failed");
                    report.evicted += 1;
                }
            }
        }

        report
    }
}
