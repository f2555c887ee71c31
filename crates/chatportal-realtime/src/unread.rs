// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unread accounting pushes.
//!
//! Counters are never cached in memory: every push recomputes from the
//! message log, so a counter can only ever reflect committed writes.

use chatportal_core::{PortalError, ServerEvent, UserId};
use chatportal_storage::{queries, Database};

use crate::registry::SessionRegistry;

/// Recompute the unread counter for the ordered pair and push it to the
/// receiver's connection, if online. Offline receivers pick the counter up
/// from the badge endpoint on their next login.
pub async fn push_recomputed(
    db: &Database,
    registry: &SessionRegistry,
    sender_id: &UserId,
    receiver_id: &UserId,
) -> Result<(), PortalError> {
    let Some(handle) = registry.lookup(receiver_id) else {
        return Ok(());
    };
    let count =
        queries::messages::count_unread(db, sender_id.as_str(), receiver_id.as_str()).await?;
    handle
        .push(ServerEvent::UnreadCountUpdate {
            sender_id: sender_id.clone(),
            count,
        })
        .await;
    Ok(())
}

/// Push an explicit zero counter to the receiver after a mark-read. The
/// zero is definitional (every matching row was just flipped), so no
/// recomputation round-trip is needed.
pub async fn push_cleared(registry: &SessionRegistry, sender_id: &UserId, receiver_id: &UserId) {
    if let Some(handle) = registry.lookup(receiver_id) {
        handle
            .push(ServerEvent::UnreadCountUpdate {
                sender_id: sender_id.clone(),
                count: 0,
            })
            .await;
    }
}

/// Per-sender unread counters for a receiver, for the login-time badge
/// endpoint.
pub async fn counts_for(
    db: &Database,
    receiver_id: &UserId,
) -> Result<Vec<(UserId, i64)>, PortalError> {
    let counts = queries::messages::unread_counts_by_sender(db, receiver_id.as_str()).await?;
    Ok(counts.into_iter().map(|(id, n)| (UserId(id), n)).collect())
}
