// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire events exchanged over a WebSocket connection.
//!
//! Frames are adjacently tagged JSON:
//! ```json
//! {"type": "send-message", "data": {"sender_id": "...", "receiver_id": "...", "body": "hi"}}
//! {"type": "message-received", "data": {"id": "...", "sender": {...}, ...}}
//! ```
//!
//! Client frames that fail to deserialize are logged and skipped by the
//! gateway; they never tear down the connection.

use serde::{Deserialize, Serialize};

use crate::types::{FileAttachment, MessageView, UserId};

/// Inbound events from a connected client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// A regular user announces its identity after connecting.
    UserConnected { user_id: UserId },
    /// An admin announces itself as an observer connection.
    AdminConnected,
    /// Send a message to a peer. At least one of `body` / `file` required.
    SendMessage {
        sender_id: UserId,
        receiver_id: UserId,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        file: Option<FileAttachment>,
    },
    /// Mark all unread messages from `sender_id` to `receiver_id` as read.
    /// The caller is the receiver.
    MarkAsRead {
        sender_id: UserId,
        receiver_id: UserId,
    },
    /// Typing indicator relay. Stateless; dropped if the peer is offline.
    Typing {
        sender_id: UserId,
        receiver_id: UserId,
        is_typing: bool,
    },
}

/// Outbound events pushed to live connections.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A new message delivered to its receiver.
    MessageReceived(MessageView),
    /// Confirmation pushed to the sender. Exactly one per send.
    MessageSent(MessageView),
    /// Notification shown on the receiver's side alongside delivery.
    NewNotification {
        title: String,
        body: String,
        sender_id: UserId,
    },
    /// Unread counter for messages from `sender_id` to this connection.
    UnreadCountUpdate { sender_id: UserId, count: i64 },
    /// The peer (`receiver_id`) read this connection's outbound messages.
    MessagesRead { receiver_id: UserId },
    /// The peer is (or stopped) typing.
    UserTyping { sender_id: UserId, is_typing: bool },
    /// Presence broadcast to every live connection.
    UserStatusChanged { user_id: UserId, is_online: bool },
    /// Observer-only: a user came online.
    UserJoined { user_id: UserId },
    /// Observer-only: a user went offline.
    UserLeft { user_id: UserId },
    /// Observer-only: snapshot of the online set, sent once on announce.
    CurrentOnlineSnapshot { user_ids: Vec<UserId> },
    /// A malformed operation was rejected. No state change occurred.
    Error { message: String },
}
