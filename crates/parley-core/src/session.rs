//! Per-connection session state.
//!
//! A session moves from `Open` (just accepted) to `Identified` (personal
//! room bound via setup); independently of that it may hold the one
//! conversation room the client is currently viewing. Disconnect is
//! terminal and purges every membership.

use crate::connection::ConnectionId;
use crate::registry::RoomRegistry;
use crate::room::RoomId;
use tracing::debug;

/// Session state for a single live connection.
#[derive(Debug)]
pub struct Session {
    /// Connection identity.
    id: ConnectionId,
    /// Personal room, set once by the first setup event.
    personal_room: Option<RoomId>,
    /// The single conversation room currently joined, if any.
    current_room: Option<RoomId>,
}

impl Session {
    /// Create a session for a freshly accepted connection.
    #[must_use]
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            personal_room: None,
            current_room: None,
        }
    }

    /// Get the connection identity.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Whether the connection has bound a personal room.
    #[must_use]
    pub fn is_identified(&self) -> bool {
        self.personal_room.is_some()
    }

    /// Get the personal room, if identified.
    #[must_use]
    pub fn personal_room(&self) -> Option<&RoomId> {
        self.personal_room.as_ref()
    }

    /// Get the conversation room currently joined, if any.
    #[must_use]
    pub fn current_room(&self) -> Option<&RoomId> {
        self.current_room.as_ref()
    }

    /// Bind this connection to a user and join its personal room.
    ///
    /// Idempotent: once identified, later calls (same or different id) are
    /// ignored and return `false`; the personal room never changes for the
    /// lifetime of the connection.
    pub fn identify(&mut self, registry: &RoomRegistry, user_id: &str) -> bool {
        if self.personal_room.is_some() {
            debug!(connection = %self.id, "Duplicate setup ignored");
            return false;
        }

        let room = RoomId::user(user_id);
        registry.join(&self.id, &room);
        self.personal_room = Some(room);

        debug!(connection = %self.id, user = %user_id, "Identified");
        true
    }

    /// Join a conversation room, leaving the previous one if any.
    ///
    /// A connection is a member of at most one conversation room at a
    /// time; switching silently migrates membership, it never errors.
    pub fn enter_conversation(&mut self, registry: &RoomRegistry, chat_id: &str) {
        let room = RoomId::conversation(chat_id);
        if self.current_room.as_ref() == Some(&room) {
            return;
        }

        if let Some(previous) = self.current_room.take() {
            registry.leave(&self.id, &previous);
        }

        registry.join(&self.id, &room);
        debug!(connection = %self.id, room = %room, "Entered conversation");
        self.current_room = Some(room);
    }

    /// Terminal transition: purge every membership from the registry.
    pub fn close(&mut self, registry: &RoomRegistry) {
        registry.remove_all(&self.id);
        self.personal_room = None;
        self.current_room = None;
    }
}
