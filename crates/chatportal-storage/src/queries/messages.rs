// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log operations.
//!
//! The log is append-only: rows are inserted once, the only permitted
//! mutation is flipping `is_read` from 0 to 1, and deletion happens solely
//! through the user cascade in `queries::users`.

use chatportal_core::PortalError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{FileAttachment, MessageRecord};

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, body, file_url, file_name, \
                               file_type, file_size, is_read, created_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let file_url: Option<String> = row.get(4)?;
    let file = match file_url {
        Some(file_url) => Some(FileAttachment {
            file_url,
            file_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            file_type: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            file_size: row.get::<_, Option<i64>>(7)?.unwrap_or_default(),
        }),
        None => None,
    };
    Ok(MessageRecord {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        body: row.get(3)?,
        file,
        is_read: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Append a message to the log.
pub async fn insert_message(db: &Database, msg: &MessageRecord) -> Result<(), PortalError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            let (file_url, file_name, file_type, file_size) = match &msg.file {
                Some(f) => (
                    Some(f.file_url.clone()),
                    Some(f.file_name.clone()),
                    Some(f.file_type.clone()),
                    Some(f.file_size),
                ),
                None => (None, None, None, None),
            };
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, body, file_url, file_name, file_type, file_size, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    msg.id,
                    msg.sender_id,
                    msg.receiver_id,
                    msg.body,
                    file_url,
                    file_name,
                    file_type,
                    file_size,
                    msg.is_read,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The full conversation between two users, in either direction, oldest
/// first. Insertion order breaks created_at ties.
pub async fn conversation(
    db: &Database,
    a: &str,
    b: &str,
) -> Result<Vec<MessageRecord>, PortalError> {
    let a = a.to_string();
    let b = b.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![a, b], message_from_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All messages a user sent or received, optionally bounded by an inclusive
/// RFC 3339 time range (admin audit path).
pub async fn messages_for_user(
    db: &Database,
    user_id: &str,
    start: Option<String>,
    end: Option<String>,
) -> Result<Vec<MessageRecord>, PortalError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE (sender_id = ?1 OR receiver_id = ?1)"
            );
            let mut bound: Vec<String> = vec![user_id];
            if let Some(start) = &start {
                bound.push(start.clone());
                sql += &format!(" AND created_at >= ?{}", bound.len());
            }
            if let Some(end) = &end {
                bound.push(end.clone());
                sql += &format!(" AND created_at <= ?{}", bound.len());
            }
            sql += " ORDER BY created_at ASC, rowid ASC";

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(bound), message_from_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flip every unread message from `sender_id` to `receiver_id` to read.
/// Returns the number of rows changed (0 on repeat calls; idempotent).
pub async fn mark_read(
    db: &Database,
    sender_id: &str,
    receiver_id: &str,
) -> Result<usize, PortalError> {
    let sender_id = sender_id.to_string();
    let receiver_id = receiver_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0",
                params![sender_id, receiver_id],
            )?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Live unread count for the ordered pair (sender, receiver).
pub async fn count_unread(
    db: &Database,
    sender_id: &str,
    receiver_id: &str,
) -> Result<i64, PortalError> {
    let sender_id = sender_id.to_string();
    let receiver_id = receiver_id.to_string();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0",
                params![sender_id, receiver_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Total size of the message log.
pub async fn count_messages(db: &Database) -> Result<i64, PortalError> {
    db.connection()
        .call(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Unread counts for a receiver, grouped by sender (badge endpoint).
pub async fn unread_counts_by_sender(
    db: &Database,
    receiver_id: &str,
) -> Result<Vec<(String, i64)>, PortalError> {
    let receiver_id = receiver_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT sender_id, COUNT(*) FROM messages
                 WHERE receiver_id = ?1 AND is_read = 0
                 GROUP BY sender_id",
            )?;
            let rows = stmt.query_map(params![receiver_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            let mut counts = Vec::new();
            for row in rows {
                counts.push(row?);
            }
            Ok(counts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
