// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the chatportal server.
//!
//! REST routes cover registration, login, chat-partner listing, message
//! history, unread counters, and the admin surface; `/ws` upgrades into
//! the real-time protocol driven by `chatportal-realtime`.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use server::{start_server, GatewayState, ServerConfig};
