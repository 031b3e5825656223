//! Room abstraction for Parley.
//!
//! A room is a named delivery group; a broadcast reaches exactly its
//! current subscriber set. User ids and conversation ids historically
//! shared one identifier space, so room identifiers are tagged by kind to
//! rule out cross-delivery when a conversation id equals a user id.

use crate::connection::ConnectionId;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// A namespaced room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomId {
    /// Personal room: reaches a specific user regardless of which
    /// conversation (if any) they are viewing.
    User(String),
    /// Conversation room: reaches everyone currently viewing that
    /// conversation.
    Conversation(String),
}

impl RoomId {
    /// Create a personal room id for a user.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// Create a shared room id for a conversation.
    #[must_use]
    pub fn conversation(id: impl Into<String>) -> Self {
        Self::Conversation(id.into())
    }

    /// Get the untagged identifier.
    #[must_use]
    pub fn raw_id(&self) -> &str {
        match self {
            Self::User(id) | Self::Conversation(id) => id,
        }
    }

    /// Whether this is a personal room.
    #[must_use]
    pub fn is_personal(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Conversation(id) => write!(f, "conversation:{id}"),
        }
    }
}

/// A room and its current subscriber set.
#[derive(Debug)]
pub struct Room {
    /// Room identifier.
    id: RoomId,
    /// Set of subscribed connection IDs.
    subscribers: HashSet<ConnectionId>,
}

impl Room {
    /// Create a new, empty room.
    #[must_use]
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            subscribers: HashSet::new(),
        }
    }

    /// Get the room identifier.
    #[must_use]
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Get the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if a connection is subscribed.
    #[must_use]
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.subscribers.contains(connection_id)
    }

    /// Subscribe a connection to this room.
    ///
    /// Returns `false` if the connection was already subscribed.
    pub fn subscribe(&mut self, connection_id: ConnectionId) -> bool {
        let added = self.subscribers.insert(connection_id.clone());
        if added {
            debug!(room = %self.id, connection = %connection_id, "Connection subscribed");
        }
        added
    }

    /// Unsubscribe a connection from this room.
    ///
    /// Returns `true` if the connection was subscribed.
    pub fn unsubscribe(&mut self, connection_id: &ConnectionId) -> bool {
        let removed = self.subscribers.remove(connection_id);
        if removed {
            debug!(room = %self.id, connection = %connection_id, "Connection unsubscribed");
        }
        removed
    }

    /// Get all subscriber IDs.
    #[must_use]
    pub fn subscribers(&self) -> Vec<ConnectionId> {
        self.subscribers.iter().cloned().collect()
    }

    /// Check if the room has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_namespaces_do_not_collide() {
        let user = RoomId::user("42");
        let conversation = RoomId::conversation("42");
        assert_ne!(user, conversation);
        assert_eq!(user.raw_id(), conversation.raw_id());
    }

    #[test]
    fn test_room_id_display() {
        assert_eq!(RoomId::user("u1").to_string(), "user:u1");
        assert_eq!(RoomId::conversation("c1").to_string(), "conversation:c1");
    }

    #[test]
    fn test_room_subscribe_unsubscribe() {
        let mut room = Room::new(RoomId::conversation("c1"));
        assert!(room.is_empty());

        assert!(room.subscribe("conn-1".into()));
        assert_eq!(room.subscriber_count(), 1);
        assert!(room.contains(&"conn-1".into()));

        // Re-subscribing is a no-op
        assert!(!room.subscribe("conn-1".into()));
        assert_eq!(room.subscriber_count(), 1);

        assert!(room.subscribe("conn-2".into()));
        assert_eq!(room.subscriber_count(), 2);

        assert!(room.unsubscribe(&"conn-1".into()));
        assert!(!room.contains(&"conn-1".into()));

        // Unsubscribing a non-member
        assert!(!room.unsubscribe(&"conn-1".into()));
    }
}
