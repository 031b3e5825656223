//! # parley-core
//!
//! The relay engine behind the Parley chat server.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **RoomId / Room** - Namespaced delivery groups for connections
//! - **RoomRegistry** - Shared room membership, safe under concurrent access
//! - **Session** - Per-connection identification and conversation state
//! - **Broadcaster** - Fan-out of events to a room's subscribers
//! - **dispatch** - Inbound event name to handler binding
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │   Session   │────▶│  dispatch   │────▶│ Broadcaster  │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!                                                │
//!                                                ▼
//!                                         ┌──────────────┐
//!                                         │ RoomRegistry │
//!                                         └──────────────┘
//! ```
//!
//! The registry is the only shared mutable state; it is injected into each
//! connection's handlers rather than living in a global, so tests get a
//! fresh registry per case and servers can own exactly one.

pub mod broadcast;
pub mod connection;
pub mod dispatch;
pub mod registry;
pub mod room;
pub mod session;

pub use broadcast::Broadcaster;
pub use connection::ConnectionId;
pub use dispatch::dispatch;
pub use registry::{RegistryConfig, RegistryStats, RoomRegistry};
pub use room::{Room, RoomId};
pub use session::Session;
