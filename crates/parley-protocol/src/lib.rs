//! # parley-protocol
//!
//! Wire contract for the Parley chat relay.
//!
//! Every frame on the wire is one JSON-encoded event envelope:
//!
//! ```json
//! {"event": "new message", "data": { ... }}
//! ```
//!
//! The event name strings are part of the wire contract and must match
//! byte-for-byte, including spacing (`"new message"`, `"join chat"`,
//! `"stop typing"`). Chat and message payloads are supplied by external
//! collaborators and pass through the relay verbatim; the relay inspects
//! only the handful of fields exposed by the [`payload`] accessors.
//!
//! ## Example
//!
//! ```rust
//! use parley_protocol::{codec, ClientEvent};
//!
//! let frame = r#"{"event":"join chat","data":"conv-42"}"#;
//! let event = codec::decode(frame).unwrap();
//! assert!(matches!(event, ClientEvent::JoinChat(_)));
//! ```

pub mod codec;
pub mod events;
pub mod payload;

pub use codec::{decode, encode, ProtocolError};
pub use events::{ClientEvent, ServerEvent};
