//! Tolerant accessors for the pass-through chat payloads.
//!
//! The relay trusts caller-supplied structure and inspects only the fields
//! below. Every accessor degrades to `None` or an empty list when the
//! expected substructure is absent; a malformed payload must never
//! terminate a connection.

use serde_json::Value;

/// Get a user's identifier: the `_id` of a user object, or the string
/// itself when the payload is a bare id.
#[must_use]
pub fn user_id(user: &Value) -> Option<&str> {
    match user {
        Value::String(id) => Some(id),
        other => other.get("_id")?.as_str(),
    }
}

/// Get the `_id` of a chat object.
#[must_use]
pub fn chat_id(chat: &Value) -> Option<&str> {
    chat.get("_id")?.as_str()
}

/// Get the sender's identifier from a message payload.
#[must_use]
pub fn sender_id(message: &Value) -> Option<&str> {
    user_id(message.get("sender")?)
}

/// Get the ids of a chat object's participants (`users[]._id`).
///
/// Entries with a missing or non-string `_id` are skipped.
#[must_use]
pub fn participant_ids(chat: &Value) -> Vec<&str> {
    chat.get("users")
        .and_then(Value::as_array)
        .map(|users| users.iter().filter_map(user_id).collect())
        .unwrap_or_default()
}

/// Get the participant ids of a message payload's chat (`chat.users[]._id`).
#[must_use]
pub fn message_participant_ids(message: &Value) -> Vec<&str> {
    message.get("chat").map(participant_ids).unwrap_or_default()
}
