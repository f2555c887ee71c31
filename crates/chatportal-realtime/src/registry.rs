// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session registry: a bidirectional mapping between authenticated
//! identities and live connections, plus a separate observer (admin) set.
//!
//! The registry is the only mutable state shared across connection handlers.
//! All operations are synchronous, in-memory, and non-blocking; the mutex is
//! never held across an await point. A regular identity holds at most one
//! connection: a new announce supersedes the previous one, whose handle is
//! orphaned (the registry neither notifies nor closes it; the stale
//! handle's own disconnect later misses the guard in [`SessionRegistry::remove`]
//! and becomes a no-op). Observers have no per-identity uniqueness.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chatportal_core::{ServerEvent, UserId};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound queue depth per connection.
const CONNECTION_QUEUE: usize = 64;

/// A live connection's push handle: a stable connection id plus the mpsc
/// sender feeding that connection's WebSocket writer task.
#[derive(Debug, Clone)]
pub struct ConnHandle {
    conn_id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
}

impl ConnHandle {
    /// Create a handle and the receiving end for the connection's writer task.
    pub fn new() -> (ConnHandle, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(CONNECTION_QUEUE);
        (
            ConnHandle {
                conn_id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Push an event to this connection, preserving per-connection order.
    ///
    /// Suspends only the issuing handler when the queue is full. A closed
    /// receiver (connection already torn down) is not an error; the
    /// transport's disconnect event handles cleanup.
    pub async fn push(&self, event: ServerEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::debug!(conn_id = %self.conn_id, "push to closed connection dropped");
        }
    }
}

/// What `remove` found for a disconnecting handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removed {
    /// The handle was the current connection of this regular user.
    User(UserId),
    /// The handle was an observer connection.
    Observer,
    /// Stale or unknown handle; nothing was removed.
    NotRegistered,
}

#[derive(Default)]
struct Inner {
    /// Current connection per regular identity.
    users: HashMap<UserId, ConnHandle>,
    /// Reverse index over *current* user connections only. Superseded
    /// handles are absent here, which is exactly the disconnect guard.
    user_by_conn: HashMap<Uuid, UserId>,
    /// Observer connections, keyed by connection id.
    observers: HashMap<Uuid, ConnHandle>,
}

/// The owned registry table. See module docs for semantics.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // The critical sections below never panic (plain map operations), so a
    // poisoned mutex still holds a consistent table.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register (or replace) the connection for a regular identity.
    ///
    /// Any previous entry for the identity is overwritten and its handle
    /// orphaned. If this very connection was previously announced under a
    /// different identity, that mapping is dropped too, keeping the
    /// bidirectional index consistent.
    pub fn announce(&self, user_id: UserId, handle: ConnHandle) {
        let mut inner = self.lock();

        if let Some(old) = inner.users.get(&user_id) {
            let old_conn = old.conn_id;
            if old_conn != handle.conn_id {
                tracing::warn!(user_id = %user_id, stale_conn = %old_conn, "superseding existing session");
            }
            inner.user_by_conn.remove(&old_conn);
        }
        if let Some(previous_identity) = inner.user_by_conn.insert(handle.conn_id, user_id.clone())
        {
            if previous_identity != user_id {
                tracing::warn!(
                    conn_id = %handle.conn_id,
                    old = %previous_identity,
                    new = %user_id,
                    "connection re-announced under a different identity"
                );
                inner.users.remove(&previous_identity);
            }
        }
        inner.users.insert(user_id, handle);
    }

    /// Add an observer connection. Observers stack freely.
    pub fn announce_observer(&self, handle: ConnHandle) {
        let mut inner = self.lock();
        inner.observers.insert(handle.conn_id, handle);
    }

    /// The current connection for an identity, if online.
    pub fn lookup(&self, user_id: &UserId) -> Option<ConnHandle> {
        let inner = self.lock();
        inner.users.get(user_id).cloned()
    }

    /// Remove the entry owned by a disconnecting handle.
    ///
    /// A regular entry is removed only when the stored handle for that
    /// identity is still this very connection; a superseded (stale) handle
    /// is a no-op. Observer entries are removed unconditionally.
    pub fn remove(&self, conn_id: Uuid) -> Removed {
        let mut inner = self.lock();

        if let Some(user_id) = inner.user_by_conn.remove(&conn_id) {
            inner.users.remove(&user_id);
            return Removed::User(user_id);
        }
        if inner.observers.remove(&conn_id).is_some() {
            return Removed::Observer;
        }
        Removed::NotRegistered
    }

    /// Snapshot of currently-online identities (for new observers).
    pub fn all_online_ids(&self) -> Vec<UserId> {
        let inner = self.lock();
        inner.users.keys().cloned().collect()
    }

    /// Handles of all observer connections.
    pub fn observer_handles(&self) -> Vec<ConnHandle> {
        let inner = self.lock();
        inner.observers.values().cloned().collect()
    }

    /// Handles of every live connection, regular and observer.
    pub fn all_handles(&self) -> Vec<ConnHandle> {
        let inner = self.lock();
        inner
            .users
            .values()
            .chain(inner.observers.values())
            .cloned()
            .collect()
    }
}
