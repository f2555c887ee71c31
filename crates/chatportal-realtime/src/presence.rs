// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence tracking: mirrors registry transitions into the `users` table
//! and fans presence events out to live connections.
//!
//! Persistence here is best-effort. A failed `is_online` / `last_seen`
//! write is logged and the broadcast proceeds anyway, so a flaky disk
//! never blinds connected clients to who is actually online. The registry
//! remains the source of truth for routing.

use chatportal_core::{now_rfc3339, ServerEvent, UserId};
use chatportal_storage::{queries, Database};
use std::sync::Arc;
use tracing::{debug, error};

use crate::registry::{ConnHandle, SessionRegistry};

/// Fans presence transitions out and keeps the stored flags in step.
#[derive(Clone)]
pub struct PresenceTracker {
    db: Database,
    registry: Arc<SessionRegistry>,
}

impl PresenceTracker {
    pub fn new(db: Database, registry: Arc<SessionRegistry>) -> Self {
        PresenceTracker { db, registry }
    }

    /// A regular user came online: persist the flag, tell everyone, and
    /// tell observers via the dedicated join event.
    pub async fn user_online(&self, user_id: &UserId) {
        if let Err(e) = queries::users::set_online(&self.db, user_id.as_str()).await {
            error!(error = %e, user_id = %user_id, "failed to persist online flag");
        }
        debug!(user_id = %user_id, "user online");

        self.broadcast(ServerEvent::UserStatusChanged {
            user_id: user_id.clone(),
            is_online: true,
        })
        .await;
        self.notify_observers(ServerEvent::UserJoined {
            user_id: user_id.clone(),
        })
        .await;
    }

    /// A regular user went offline: record `last_seen`, then broadcast.
    pub async fn user_offline(&self, user_id: &UserId) {
        let last_seen = now_rfc3339();
        if let Err(e) = queries::users::set_offline(&self.db, user_id.as_str(), &last_seen).await {
            error!(error = %e, user_id = %user_id, "failed to persist offline flag");
        }
        debug!(user_id = %user_id, "user offline");

        self.broadcast(ServerEvent::UserStatusChanged {
            user_id: user_id.clone(),
            is_online: false,
        })
        .await;
        self.notify_observers(ServerEvent::UserLeft {
            user_id: user_id.clone(),
        })
        .await;
    }

    /// One-shot online snapshot for a freshly announced observer.
    pub async fn send_snapshot(&self, handle: &ConnHandle) {
        handle
            .push(ServerEvent::CurrentOnlineSnapshot {
                user_ids: self.registry.all_online_ids(),
            })
            .await;
    }

    async fn broadcast(&self, event: ServerEvent) {
        for handle in self.registry.all_handles() {
            handle.push(event.clone()).await;
        }
    }

    async fn notify_observers(&self, event: ServerEvent) {
        for handle in self.registry.observer_handles() {
            handle.push(event.clone()).await;
        }
    }
}
