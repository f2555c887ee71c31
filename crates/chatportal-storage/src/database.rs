// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: `Database` wraps a single `tokio_rusqlite::Connection`, query
//! modules accept `&Database` and go through `connection().call()`. Do NOT
//! create additional Connection instances for writes.

use chatportal_core::PortalError;
use tokio_rusqlite::Connection;

use crate::migrations::run_migrations;

/// Handle to the SQLite database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode enabled and
    /// run any pending migrations.
    pub async fn open(path: &str) -> Result<Self, PortalError> {
        Self::open_with_options(path, true).await
    }

    /// Open with explicit journal mode selection.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, PortalError> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| PortalError::Storage {
                source: Box::new(e),
            })?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(run_migrations).await.map_err(|e| match e {
            tokio_rusqlite::Error::Error(e) => e,
            e => PortalError::Storage {
                source: Box::new(e),
            },
        })?;

        tracing::debug!(path, wal_mode, "database opened");
        Ok(Database { conn })
    }

    /// The underlying tokio-rusqlite connection (single background writer).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the database, flushing the WAL.
    pub async fn close(self) -> Result<(), PortalError> {
        self.conn
            .close()
            .await
            .map_err(|e| PortalError::Storage {
                source: Box::new(e),
            })
    }
}

/// Map a tokio-rusqlite error into the portal error type.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> PortalError {
    PortalError::Storage {
        source: Box::new(e),
    }
}
