//! Inbound event dispatch.
//!
//! Binds each inbound event name to its handler. Handlers are synchronous:
//! all work is registry mutation plus outbox enqueueing, so an event runs
//! to completion before the next event from the same connection.
//!
//! Routing follows two patterns. Message and chat-lifecycle events go to
//! the personal room of each affected user, so recipients hear about them
//! even when they are not viewing that conversation. Typing indicators go
//! to the conversation room, because they only matter to peers actively
//! viewing the same conversation.

use crate::broadcast::Broadcaster;
use crate::room::RoomId;
use crate::session::Session;
use parley_protocol::{payload, ClientEvent, ServerEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Dispatch one inbound event against a connection's session.
///
/// Returns the number of connections the resulting events were queued for.
/// Malformed payloads degrade to no-ops; they never affect the connection
/// or its peers.
pub fn dispatch(event: ClientEvent, session: &mut Session, broadcaster: &Broadcaster) -> usize {
    match event {
        ClientEvent::Setup(user) => on_setup(&user, session, broadcaster),
        ClientEvent::JoinChat(chat_id) => {
            session.enter_conversation(broadcaster.registry(), &chat_id);
            0
        }
        ClientEvent::NewMessage(message) => on_new_message(message, broadcaster),
        ClientEvent::Typing(chat_id) => {
            on_typing_indicator(&chat_id, ServerEvent::Typing, session, broadcaster)
        }
        ClientEvent::StopTyping(chat_id) => {
            on_typing_indicator(&chat_id, ServerEvent::StopTyping, session, broadcaster)
        }
        ClientEvent::ClearChat(chat_id) => on_clear_chat(chat_id, broadcaster),
        ClientEvent::DeleteChat { chat, user_id } => on_delete_chat(&chat, &user_id, broadcaster),
        ClientEvent::ChatCreated { chat, user_id } => on_chat_created(chat, &user_id, broadcaster),
    }
}

/// Bind the connection to its personal room and confirm, to self only.
/// Duplicate setups are ignored entirely.
fn on_setup(user: &Value, session: &mut Session, broadcaster: &Broadcaster) -> usize {
    let Some(user_id) = payload::user_id(user) else {
        debug!(connection = %session.id(), "Setup without user id, ignoring");
        return 0;
    };

    if session.identify(broadcaster.registry(), user_id)
        && broadcaster.send_to(session.id(), ServerEvent::Connected)
    {
        1
    } else {
        0
    }
}

/// Forward a message to the personal room of every chat participant
/// except the sender.
fn on_new_message(message: Value, broadcaster: &Broadcaster) -> usize {
    let sender: Option<String> = payload::sender_id(&message).map(str::to_owned);
    let recipients: Vec<String> = payload::message_participant_ids(&message)
        .into_iter()
        .map(str::to_owned)
        .collect();

    if recipients.is_empty() {
        debug!("Message without chat participants, ignoring");
        return 0;
    }

    let event = Arc::new(ServerEvent::MessageReceived(message));
    let mut delivered = 0;

    for user_id in recipients {
        if sender.as_deref() == Some(user_id.as_str()) {
            continue;
        }
        delivered += broadcaster.emit(&RoomId::user(user_id), Arc::clone(&event), None);
    }

    delivered
}

/// Relay a typing indicator to the conversation room, sender included.
///
/// The indicator only fans out while the emitting connection is itself a
/// member of that conversation; after migrating to another conversation, a
/// stale indicator delivers nothing.
fn on_typing_indicator(
    chat_id: &str,
    event: ServerEvent,
    session: &Session,
    broadcaster: &Broadcaster,
) -> usize {
    let room = RoomId::conversation(chat_id);
    if session.current_room() != Some(&room) {
        debug!(connection = %session.id(), room = %room, "Typing indicator for a conversation not joined, ignoring");
        return 0;
    }

    broadcaster.emit(&room, Arc::new(event), None)
}

/// Notify everyone viewing a conversation that its history was cleared.
fn on_clear_chat(chat_id: String, broadcaster: &Broadcaster) -> usize {
    let room = RoomId::conversation(&chat_id);
    broadcaster.emit(&room, Arc::new(ServerEvent::ClearChat(chat_id)), None)
}

/// Notify every participant except the acting user that a chat was deleted.
fn on_delete_chat(chat: &Value, actor_id: &str, broadcaster: &Broadcaster) -> usize {
    let Some(chat_id) = payload::chat_id(chat) else {
        debug!("Delete chat without chat id, ignoring");
        return 0;
    };

    let event = Arc::new(ServerEvent::DeleteChat(chat_id.to_owned()));
    let mut delivered = 0;

    for user_id in payload::participant_ids(chat) {
        if user_id == actor_id {
            continue;
        }
        delivered += broadcaster.emit(&RoomId::user(user_id), Arc::clone(&event), None);
    }

    delivered
}

/// Notify every participant except the acting user that a chat was created.
fn on_chat_created(chat: Value, actor_id: &str, broadcaster: &Broadcaster) -> usize {
    let recipients: Vec<String> = payload::participant_ids(&chat)
        .into_iter()
        .map(str::to_owned)
        .collect();

    let event = Arc::new(ServerEvent::ChatCreated(chat));
    let mut delivered = 0;

    for user_id in recipients {
        if user_id == actor_id {
            continue;
        }
        delivered += broadcaster.emit(&RoomId::user(user_id), Arc::clone(&event), None);
    }

    delivered
}
