//! Event fan-out to room subscribers.
//!
//! The broadcaster owns one outbox per live connection and delivers a
//! shared event to every subscriber of a room, minus an optional excluded
//! connection. Delivery is fire-and-forget: it is attempted against the
//! registry snapshot taken at call time, a closed outbox is skipped, and
//! there is no retry or replay for late joiners.

use crate::connection::ConnectionId;
use crate::registry::RoomRegistry;
use crate::room::RoomId;
use dashmap::DashMap;
use parley_protocol::ServerEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Fans events out to the connections subscribed to a room.
pub struct Broadcaster {
    /// Shared room membership.
    registry: Arc<RoomRegistry>,
    /// Outbound queues, one per live connection.
    outboxes: DashMap<ConnectionId, mpsc::UnboundedSender<Arc<ServerEvent>>>,
}

impl Broadcaster {
    /// Create a broadcaster over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            outboxes: DashMap::new(),
        }
    }

    /// Get the shared registry.
    #[must_use]
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Register a connection's outbox. Called when the connection is
    /// accepted, before any of its events are dispatched.
    pub fn register(
        &self,
        connection_id: ConnectionId,
        outbox: mpsc::UnboundedSender<Arc<ServerEvent>>,
    ) {
        self.outboxes.insert(connection_id, outbox);
    }

    /// Drop a connection's outbox. Called on disconnect.
    pub fn unregister(&self, connection_id: &ConnectionId) {
        self.outboxes.remove(connection_id);
    }

    /// Get the number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.outboxes.len()
    }

    /// Deliver an event to a single connection.
    ///
    /// Returns `true` if the event was queued.
    pub fn send_to(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        match self.outboxes.get(connection_id) {
            Some(outbox) => outbox.send(Arc::new(event)).is_ok(),
            None => false,
        }
    }

    /// Deliver an event to every subscriber of a room, except `exclude`.
    ///
    /// Returns the number of connections the event was queued for.
    pub fn emit(
        &self,
        room_id: &RoomId,
        event: Arc<ServerEvent>,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let subscribers = self.registry.subscribers_of(room_id);
        let mut delivered = 0;

        for connection_id in &subscribers {
            if Some(connection_id) == exclude {
                continue;
            }
            if let Some(outbox) = self.outboxes.get(connection_id) {
                if outbox.send(Arc::clone(&event)).is_ok() {
                    delivered += 1;
                }
            }
        }

        trace!(
            room = %room_id,
            event = event.event_name(),
            recipients = delivered,
            "Emitted"
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(broadcaster: &Broadcaster, name: &str) -> mpsc::UnboundedReceiver<Arc<ServerEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        broadcaster.register(ConnectionId::new(name), tx);
        rx
    }

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let registry = Arc::new(RoomRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut rx1 = register(&broadcaster, "conn-1");
        let mut rx2 = register(&broadcaster, "conn-2");

        let room = RoomId::conversation("c1");
        registry.join(&"conn-1".into(), &room);
        registry.join(&"conn-2".into(), &room);

        let count = broadcaster.emit(&room, Arc::new(ServerEvent::Typing), None);
        assert_eq!(count, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_emit_excludes_connection() {
        let registry = Arc::new(RoomRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut rx1 = register(&broadcaster, "conn-1");
        let mut rx2 = register(&broadcaster, "conn-2");

        let room = RoomId::conversation("c1");
        registry.join(&"conn-1".into(), &room);
        registry.join(&"conn-2".into(), &room);

        let excluded = ConnectionId::new("conn-1");
        let count = broadcaster.emit(&room, Arc::new(ServerEvent::Typing), Some(&excluded));
        assert_eq!(count, 1);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_emit_to_unknown_room_delivers_nothing() {
        let registry = Arc::new(RoomRegistry::new());
        let broadcaster = Broadcaster::new(registry);
        let _rx = register(&broadcaster, "conn-1");

        let count = broadcaster.emit(
            &RoomId::conversation("nowhere"),
            Arc::new(ServerEvent::Typing),
            None,
        );
        assert_eq!(count, 0);
    }

    #[test]
    fn test_send_to_unknown_connection() {
        let registry = Arc::new(RoomRegistry::new());
        let broadcaster = Broadcaster::new(registry);

        assert!(!broadcaster.send_to(&"ghost".into(), ServerEvent::Connected));
    }

    #[test]
    fn test_unregistered_connection_is_skipped() {
        let registry = Arc::new(RoomRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let _rx = register(&broadcaster, "conn-1");

        let room = RoomId::user("u1");
        registry.join(&"conn-1".into(), &room);
        broadcaster.unregister(&"conn-1".into());

        let count = broadcaster.emit(&room, Arc::new(ServerEvent::Connected), None);
        assert_eq!(count, 0);
    }
}
