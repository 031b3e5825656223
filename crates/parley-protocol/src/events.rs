//! Event types for the Parley wire protocol.
//!
//! Events are adjacently tagged: the `event` field carries the event name,
//! the `data` field carries the payload. Chat and message objects stay as
//! raw [`serde_json::Value`]s because the relay forwards them verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Bind this connection to a user. The payload is a user object;
    /// only its `_id` is read.
    #[serde(rename = "setup")]
    Setup(Value),

    /// Enter a conversation room, leaving the previous one if any.
    #[serde(rename = "join chat")]
    JoinChat(String),

    /// Fan a message out to every participant except the sender.
    /// The payload is opaque apart from `chat.users[]._id` and `sender._id`.
    #[serde(rename = "new message")]
    NewMessage(Value),

    /// Typing indicator for a conversation.
    #[serde(rename = "typing")]
    Typing(String),

    /// End-of-typing indicator for a conversation.
    #[serde(rename = "stop typing")]
    StopTyping(String),

    /// Notify viewers of a conversation that its history was cleared.
    #[serde(rename = "clear chat")]
    ClearChat(String),

    /// Notify every participant except the acting user that a chat
    /// was deleted.
    #[serde(rename = "delete chat")]
    DeleteChat {
        /// The deleted chat object; `users[]._id` and `_id` are read.
        chat: Value,
        /// The acting user, excluded from delivery.
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// Notify every participant except the acting user that a chat
    /// was created.
    #[serde(rename = "chat created")]
    ChatCreated {
        /// The new chat object, forwarded verbatim; `users[]._id` is read.
        chat: Value,
        /// The acting user, excluded from delivery.
        #[serde(rename = "userId")]
        user_id: String,
    },
}

impl ClientEvent {
    /// Get the wire name of this event.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientEvent::Setup(_) => "setup",
            ClientEvent::JoinChat(_) => "join chat",
            ClientEvent::NewMessage(_) => "new message",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::StopTyping(_) => "stop typing",
            ClientEvent::ClearChat(_) => "clear chat",
            ClientEvent::DeleteChat { .. } => "delete chat",
            ClientEvent::ChatCreated { .. } => "chat created",
        }
    }
}

/// An event sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Acknowledges `setup`; sent to the identifying connection only.
    #[serde(rename = "connected")]
    Connected,

    /// A new message, forwarded verbatim to each recipient's personal room.
    #[serde(rename = "message received")]
    MessageReceived(Value),

    /// A peer in the conversation is typing.
    #[serde(rename = "typing")]
    Typing,

    /// A peer in the conversation stopped typing.
    #[serde(rename = "stop typing")]
    StopTyping,

    /// The chat with this id had its history cleared.
    #[serde(rename = "clear chat")]
    ClearChat(String),

    /// The chat with this id was deleted.
    #[serde(rename = "delete chat")]
    DeleteChat(String),

    /// A chat the recipient participates in was created.
    #[serde(rename = "chat created")]
    ChatCreated(Value),
}

impl ServerEvent {
    /// Get the wire name of this event.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::Connected => "connected",
            ServerEvent::MessageReceived(_) => "message received",
            ServerEvent::Typing => "typing",
            ServerEvent::StopTyping => "stop typing",
            ServerEvent::ClearChat(_) => "clear chat",
            ServerEvent::DeleteChat(_) => "delete chat",
            ServerEvent::ChatCreated(_) => "chat created",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_event_names_match_wire() {
        let frames = [
            (r#"{"event":"setup","data":{"_id":"u1"}}"#, "setup"),
            (r#"{"event":"join chat","data":"conv-1"}"#, "join chat"),
            (r#"{"event":"new message","data":{"content":"hi"}}"#, "new message"),
            (r#"{"event":"typing","data":"conv-1"}"#, "typing"),
            (r#"{"event":"stop typing","data":"conv-1"}"#, "stop typing"),
            (r#"{"event":"clear chat","data":"conv-1"}"#, "clear chat"),
            (
                r#"{"event":"delete chat","data":{"chat":{"_id":"c1","users":[]},"userId":"u1"}}"#,
                "delete chat",
            ),
            (
                r#"{"event":"chat created","data":{"chat":{"users":[]},"userId":"u1"}}"#,
                "chat created",
            ),
        ];

        for (frame, name) in frames {
            let event: ClientEvent = serde_json::from_str(frame).unwrap();
            assert_eq!(event.event_name(), name);
        }
    }

    #[test]
    fn test_outbound_event_names_match_wire() {
        let events = [
            (ServerEvent::Connected, "connected"),
            (
                ServerEvent::MessageReceived(json!({"content": "hi"})),
                "message received",
            ),
            (ServerEvent::Typing, "typing"),
            (ServerEvent::StopTyping, "stop typing"),
            (ServerEvent::ClearChat("c1".into()), "clear chat"),
            (ServerEvent::DeleteChat("c1".into()), "delete chat"),
            (ServerEvent::ChatCreated(json!({"_id": "c1"})), "chat created"),
        ];

        for (event, name) in events {
            let encoded = serde_json::to_value(&event).unwrap();
            assert_eq!(encoded["event"], name);
            assert_eq!(event.event_name(), name);
        }
    }

    #[test]
    fn test_connected_has_no_data_field() {
        let encoded = serde_json::to_value(ServerEvent::Connected).unwrap();
        assert_eq!(encoded, json!({"event": "connected"}));
    }

    #[test]
    fn test_message_payload_passes_through_verbatim() {
        let payload = json!({
            "chat": {"users": [{"_id": "u1"}, {"_id": "u2"}]},
            "sender": {"_id": "u1"},
            "content": "hello",
            "extra": {"nested": [1, 2, 3]}
        });

        let event = ServerEvent::MessageReceived(payload.clone());
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["data"], payload);
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let frame = r#"{"event":"presence","data":"conv-1"}"#;
        assert!(serde_json::from_str::<ClientEvent>(frame).is_err());
    }
}
