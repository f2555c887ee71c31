// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time core: session registry, presence tracking, the messaging
//! protocol handler, and unread accounting.
//!
//! This crate is transport-agnostic. The gateway decodes WebSocket frames
//! into [`chatportal_core::ClientEvent`]s and feeds them to a
//! [`ProtocolHandler`]; outbound [`chatportal_core::ServerEvent`]s flow
//! back through each connection's [`registry::ConnHandle`] queue.

pub mod presence;
pub mod protocol;
pub mod registry;
pub mod unread;

pub use presence::PresenceTracker;
pub use protocol::{ConnState, Connection, ProtocolHandler};
pub use registry::{ConnHandle, Removed, SessionRegistry};
