//! Shared room registry for Parley.
//!
//! The registry maps room identifiers to subscriber sets. It is owned by
//! the relay server and handed to every connection's handlers; all
//! operations are safe under concurrent access from independent
//! connections, and no transaction spans more than one operation.

use crate::connection::ConnectionId;
use crate::room::{Room, RoomId};
use dashmap::{DashMap, DashSet};
use tracing::debug;

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Whether to drop a room's storage once its last member leaves.
    /// Memory hygiene only; correctness does not depend on it.
    pub reclaim_empty_rooms: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reclaim_empty_rooms: true,
        }
    }
}

/// The shared room registry.
///
/// Invariant: a connection appears in a room's subscriber set if and only
/// if it has joined that room and has not left it or disconnected.
pub struct RoomRegistry {
    /// Rooms indexed by identifier.
    rooms: DashMap<RoomId, Room>,
    /// Reverse index: connection -> rooms it belongs to.
    memberships: DashMap<ConnectionId, DashSet<RoomId>>,
    /// Configuration.
    config: RegistryConfig,
}

impl RoomRegistry {
    /// Create a new registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            memberships: DashMap::new(),
            config,
        }
    }

    /// Add a connection to a room, creating the room if absent.
    ///
    /// Idempotent: joining a room already joined is a no-op and returns
    /// `false`.
    pub fn join(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        let conn_rooms = self
            .memberships
            .entry(connection_id.clone())
            .or_default();

        if !conn_rooms.insert(room_id.clone()) {
            return false;
        }

        let mut room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            debug!(room = %room_id, "Creating room");
            Room::new(room_id.clone())
        });
        room.subscribe(connection_id.clone());

        debug!(
            room = %room_id,
            connection = %connection_id,
            subscribers = room.subscriber_count(),
            "Joined"
        );

        true
    }

    /// Remove a connection from a room.
    ///
    /// Unknown rooms and non-members are a normal no-op, not an error.
    /// Returns `true` if the connection was a member.
    pub fn leave(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        let was_member = self
            .memberships
            .get(connection_id)
            .map(|rooms| rooms.remove(room_id).is_some())
            .unwrap_or(false);

        if !was_member {
            return false;
        }

        self.detach(connection_id, room_id);

        debug!(room = %room_id, connection = %connection_id, "Left");
        true
    }

    /// Remove a connection from every room it belongs to.
    ///
    /// Called exactly once, on disconnect.
    pub fn remove_all(&self, connection_id: &ConnectionId) {
        if let Some((_, rooms)) = self.memberships.remove(connection_id) {
            for room_id in rooms {
                self.detach(connection_id, &room_id);
            }
        }

        debug!(connection = %connection_id, "Removed from all rooms");
    }

    /// Snapshot of the connections currently subscribed to a room.
    ///
    /// Reflects the most recent completed join/leave from any connection.
    #[must_use]
    pub fn subscribers_of(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.subscribers())
            .unwrap_or_default()
    }

    /// Check if a connection is a member of a room.
    #[must_use]
    pub fn is_member(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        self.memberships
            .get(connection_id)
            .map(|rooms| rooms.contains(room_id))
            .unwrap_or(false)
    }

    /// Get the rooms a connection belongs to.
    #[must_use]
    pub fn rooms_of(&self, connection_id: &ConnectionId) -> Vec<RoomId> {
        self.memberships
            .get(connection_id)
            .map(|rooms| rooms.iter().map(|r| r.clone()).collect())
            .unwrap_or_default()
    }

    /// Get the number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            room_count: self.rooms.len(),
            connection_count: self.memberships.len(),
            total_memberships: self.memberships.iter().map(|r| r.len()).sum(),
        }
    }

    /// Drop a connection from a room's subscriber set, reclaiming the room
    /// if it became empty.
    fn detach(&self, connection_id: &ConnectionId, room_id: &RoomId) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.unsubscribe(connection_id);

            if self.config.reclaim_empty_rooms && room.is_empty() {
                drop(room); // Release the lock
                if self.rooms.remove_if(room_id, |_, r| r.is_empty()).is_some() {
                    debug!(room = %room_id, "Reclaimed empty room");
                }
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry statistics.
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Number of live rooms.
    pub room_count: usize,
    /// Number of connections with at least one membership.
    pub connection_count: usize,
    /// Total number of memberships.
    pub total_memberships: usize,
}
