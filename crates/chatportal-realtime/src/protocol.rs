// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The messaging protocol handler: dispatches decoded client events
//! against the registry, presence tracker, and message log.
//!
//! One handler instance is shared by all connections; per-connection state
//! lives in [`Connection`], owned by that connection's read loop. Each
//! read loop processes its frames sequentially, so per sender→receiver
//! pair delivery order equals processing order.
//!
//! Durability before delivery: a message is awaited into the log before
//! any push. A persistence failure aborts the operation with no downstream
//! pushes at all.

use std::sync::Arc;

use chatportal_core::{now_rfc3339, ClientEvent, MessageRecord, MessageView, ServerEvent, UserId};
use chatportal_storage::{queries, Database};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::presence::PresenceTracker;
use crate::registry::{ConnHandle, Removed, SessionRegistry};
use crate::unread;

/// What a connection has announced itself as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnState {
    Unauthenticated,
    User(UserId),
    Observer,
}

/// Per-connection protocol state, owned by the connection's read loop.
#[derive(Debug)]
pub struct Connection {
    handle: ConnHandle,
    state: ConnState,
}

impl Connection {
    pub fn new(handle: ConnHandle) -> Self {
        Connection {
            handle,
            state: ConnState::Unauthenticated,
        }
    }

    pub fn handle(&self) -> &ConnHandle {
        &self.handle
    }

    pub fn state(&self) -> &ConnState {
        &self.state
    }
}

/// Shared protocol dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct ProtocolHandler {
    db: Database,
    registry: Arc<SessionRegistry>,
    presence: PresenceTracker,
}

impl ProtocolHandler {
    pub fn new(db: Database, registry: Arc<SessionRegistry>) -> Self {
        let presence = PresenceTracker::new(db.clone(), Arc::clone(&registry));
        ProtocolHandler {
            db,
            registry,
            presence,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Dispatch one decoded client frame for `conn`.
    pub async fn handle_event(&self, conn: &mut Connection, event: ClientEvent) {
        match event {
            ClientEvent::UserConnected { user_id } => self.announce_user(conn, user_id).await,
            ClientEvent::AdminConnected => self.announce_observer(conn).await,
            ClientEvent::SendMessage {
                sender_id,
                receiver_id,
                body,
                file,
            } => {
                self.send_message(conn, sender_id, receiver_id, body, file)
                    .await
            }
            ClientEvent::MarkAsRead {
                sender_id,
                receiver_id,
            } => self.mark_read(conn, sender_id, receiver_id).await,
            ClientEvent::Typing {
                sender_id,
                receiver_id,
                is_typing,
            } => self.typing(sender_id, receiver_id, is_typing).await,
        }
    }

    /// Tear down a connection's registrations. Called exactly once by the
    /// transport when the socket closes, and safe for superseded handles.
    pub async fn disconnect(&self, conn: &Connection) {
        match self.registry.remove(conn.handle.conn_id()) {
            Removed::User(user_id) => self.presence.user_offline(&user_id).await,
            Removed::Observer => debug!(conn_id = %conn.handle.conn_id(), "observer disconnected"),
            Removed::NotRegistered => {
                debug!(conn_id = %conn.handle.conn_id(), "disconnect of unregistered connection")
            }
        }
    }

    async fn announce_user(&self, conn: &mut Connection, user_id: UserId) {
        if conn.state != ConnState::Unauthenticated {
            warn!(conn_id = %conn.handle.conn_id(), state = ?conn.state, "repeat announce; replacing");
            if let Removed::User(old_id) = self.registry.remove(conn.handle.conn_id()) {
                // A repeat announce under the same identity is not an
                // offline transition; the user stays online throughout.
                if old_id != user_id {
                    self.presence.user_offline(&old_id).await;
                }
            }
        }

        match queries::users::get_user(&self.db, user_id.as_str()).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                conn.handle
                    .push(ServerEvent::Error {
                        message: format!("unknown user: {user_id}"),
                    })
                    .await;
                return;
            }
            Err(e) => {
                error!(error = %e, user_id = %user_id, "announce lookup failed");
                conn.handle
                    .push(ServerEvent::Error {
                        message: "announce failed".to_string(),
                    })
                    .await;
                return;
            }
        }

        self.registry.announce(user_id.clone(), conn.handle.clone());
        conn.state = ConnState::User(user_id.clone());
        self.presence.user_online(&user_id).await;
    }

    async fn announce_observer(&self, conn: &mut Connection) {
        if conn.state != ConnState::Unauthenticated {
            warn!(conn_id = %conn.handle.conn_id(), state = ?conn.state, "repeat announce; replacing");
            if let Removed::User(user_id) = self.registry.remove(conn.handle.conn_id()) {
                self.presence.user_offline(&user_id).await;
            }
        }

        self.registry.announce_observer(conn.handle.clone());
        conn.state = ConnState::Observer;
        self.presence.send_snapshot(&conn.handle).await;
    }

    async fn send_message(
        &self,
        conn: &Connection,
        sender_id: UserId,
        receiver_id: UserId,
        body: Option<String>,
        file: Option<chatportal_core::FileAttachment>,
    ) {
        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.0.clone(),
            receiver_id: receiver_id.0.clone(),
            body,
            file,
            is_read: false,
            created_at: now_rfc3339(),
        };
        if !record.has_content() {
            conn.handle
                .push(ServerEvent::Error {
                    message: "message requires a body or a file".to_string(),
                })
                .await;
            return;
        }

        let (sender, receiver) = match self.load_pair(&sender_id, &receiver_id).await {
            Ok(pair) => pair,
            Err(message) => {
                conn.handle.push(ServerEvent::Error { message }).await;
                return;
            }
        };

        // Durability first: nothing is pushed unless the log accepted the row.
        if let Err(e) = queries::messages::insert_message(&self.db, &record).await {
            error!(error = %e, sender_id = %sender_id, receiver_id = %receiver_id, "message insert failed");
            conn.handle
                .push(ServerEvent::Error {
                    message: "message could not be stored".to_string(),
                })
                .await;
            return;
        }

        let view = MessageView::from_record(record, &sender, &receiver);

        if let Some(receiver_handle) = self.registry.lookup(&receiver_id) {
            receiver_handle
                .push(ServerEvent::MessageReceived(view.clone()))
                .await;
            let preview = view
                .body
                .clone()
                .unwrap_or_else(|| "Sent a file".to_string());
            receiver_handle
                .push(ServerEvent::NewNotification {
                    title: format!("New message from {}", sender.name),
                    body: preview,
                    sender_id: sender_id.clone(),
                })
                .await;
        }

        // Exactly one confirmation, to the originating connection, whether
        // or not the receiver was online.
        conn.handle.push(ServerEvent::MessageSent(view)).await;

        if let Err(e) =
            unread::push_recomputed(&self.db, &self.registry, &sender_id, &receiver_id).await
        {
            error!(error = %e, receiver_id = %receiver_id, "unread recompute failed");
        }
    }

    async fn mark_read(&self, conn: &Connection, sender_id: UserId, receiver_id: UserId) {
        let changed = match queries::messages::mark_read(
            &self.db,
            sender_id.as_str(),
            receiver_id.as_str(),
        )
        .await
        {
            Ok(changed) => changed,
            Err(e) => {
                error!(error = %e, sender_id = %sender_id, receiver_id = %receiver_id, "mark-read failed");
                return;
            }
        };
        debug!(sender_id = %sender_id, receiver_id = %receiver_id, changed, "marked read");

        if let Some(sender_handle) = self.registry.lookup(&sender_id) {
            sender_handle
                .push(ServerEvent::MessagesRead {
                    receiver_id: receiver_id.clone(),
                })
                .await;
        }
        // The caller is the receiver; its counter for this sender is now zero.
        conn.handle
            .push(ServerEvent::UnreadCountUpdate {
                sender_id,
                count: 0,
            })
            .await;
    }

    async fn typing(&self, sender_id: UserId, receiver_id: UserId, is_typing: bool) {
        if let Some(handle) = self.registry.lookup(&receiver_id) {
            handle
                .push(ServerEvent::UserTyping {
                    sender_id,
                    is_typing,
                })
                .await;
        }
    }

    async fn load_pair(
        &self,
        sender_id: &UserId,
        receiver_id: &UserId,
    ) -> Result<(chatportal_core::User, chatportal_core::User), String> {
        let sender = queries::users::get_user(&self.db, sender_id.as_str())
            .await
            .map_err(|e| {
                error!(error = %e, "sender lookup failed");
                "send failed".to_string()
            })?
            .ok_or_else(|| format!("unknown sender: {sender_id}"))?;
        let receiver = queries::users::get_user(&self.db, receiver_id.as_str())
            .await
            .map_err(|e| {
                error!(error = %e, "receiver lookup failed");
                "send failed".to_string()
            })?
            .ok_or_else(|| format!("unknown receiver: {receiver_id}"))?;
        Ok((sender, receiver))
    }
}
