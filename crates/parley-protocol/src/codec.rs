//! Codec for encoding and decoding Parley event frames.
//!
//! Frames are JSON text; the WebSocket transport supplies the message
//! framing, so no length prefix is needed.

use thiserror::Error;

use crate::events::{ClientEvent, ServerEvent};

/// Maximum frame size (16 MiB). A hard cap; servers usually enforce a much
/// smaller transport-level limit on top of it.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[source] serde_json::Error),

    /// Frame bytes are not valid UTF-8.
    #[error("Frame is not valid UTF-8")]
    NotUtf8,
}

/// Encode a server event to a JSON text frame.
///
/// # Errors
///
/// Returns an error if the event is too large or encoding fails.
pub fn encode(event: &ServerEvent) -> Result<String, ProtocolError> {
    let frame = serde_json::to_string(event).map_err(ProtocolError::Encode)?;

    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(frame.len()));
    }

    Ok(frame)
}

/// Decode a client event from a JSON text frame.
///
/// # Errors
///
/// Returns an error if the frame is too large, is not valid JSON, or names
/// an unknown event.
pub fn decode(frame: &str) -> Result<ClientEvent, ProtocolError> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(frame.len()));
    }

    serde_json::from_str(frame).map_err(ProtocolError::Decode)
}

/// Decode a client event from raw frame bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8 or the frame is invalid.
pub fn decode_bytes(data: &[u8]) -> Result<ClientEvent, ProtocolError> {
    let frame = std::str::from_utf8(data).map_err(|_| ProtocolError::NotUtf8)?;
    decode(frame)
}
