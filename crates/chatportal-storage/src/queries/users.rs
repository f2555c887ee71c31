// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User account CRUD operations.

use std::str::FromStr;

use chatportal_core::PortalError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{Role, User};

const USER_COLUMNS: &str =
    "id, name, email, employee_id, password_hash, role, is_online, last_seen, created_at";

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(5)?;
    let role = Role::from_str(&role).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        employee_id: row.get(3)?,
        password_hash: row.get(4)?,
        role,
        is_online: row.get(6)?,
        last_seen: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a new user account.
pub async fn create_user(db: &Database, user: &User) -> Result<(), PortalError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, employee_id, password_hash, role, is_online, last_seen, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.id,
                    user.name,
                    user.email,
                    user.employee_id,
                    user.password_hash,
                    user.role.to_string(),
                    user.is_online,
                    user.last_seen,
                    user.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a user by id.
pub async fn get_user(db: &Database, id: &str) -> Result<Option<User>, PortalError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
            match stmt.query_row(params![id], user_from_row) {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a user by email (login path).
pub async fn get_user_by_email(db: &Database, email: &str) -> Result<Option<User>, PortalError> {
    let email = email.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;
            match stmt.query_row(params![email], user_from_row) {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// True when an account already uses this email or employee id.
pub async fn email_or_employee_id_exists(
    db: &Database,
    email: &str,
    employee_id: &str,
) -> Result<bool, PortalError> {
    let email = email.to_string();
    let employee_id = employee_id.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE email = ?1 OR employee_id = ?2",
                params![email, employee_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List users of a given role, sorted by name.
pub async fn list_users_by_role(db: &Database, role: Role) -> Result<Vec<User>, PortalError> {
    let role = role.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY name ASC"
            ))?;
            let rows = stmt.query_map(params![role], user_from_row)?;
            let mut users = Vec::new();
            for row in rows {
                users.push(row?);
            }
            Ok(users)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all non-admin users, newest first (admin account listing).
pub async fn list_non_admin_users(db: &Database) -> Result<Vec<User>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role != 'admin' ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], user_from_row)?;
            let mut users = Vec::new();
            for row in rows {
                users.push(row?);
            }
            Ok(users)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all non-admin users sorted by name (an admin's chat-partner view).
pub async fn list_non_admin_users_by_name(db: &Database) -> Result<Vec<User>, PortalError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role != 'admin' ORDER BY name ASC"
            ))?;
            let rows = stmt.query_map([], user_from_row)?;
            let mut users = Vec::new();
            for row in rows {
                users.push(row?);
            }
            Ok(users)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a user online.
pub async fn set_online(db: &Database, id: &str) -> Result<(), PortalError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("UPDATE users SET is_online = 1 WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a user offline and record when they were last seen.
pub async fn set_offline(db: &Database, id: &str, last_seen: &str) -> Result<(), PortalError> {
    let id = id.to_string();
    let last_seen = last_seen.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET is_online = 0, last_seen = ?1 WHERE id = ?2",
                params![last_seen, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace a user's password hash (admin credential rotation).
pub async fn update_password(
    db: &Database,
    id: &str,
    password_hash: &str,
) -> Result<(), PortalError> {
    let id = id.to_string();
    let password_hash = password_hash.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a user and every message they sent or received, atomically.
///
/// Returns false when no such user existed.
pub async fn delete_user_cascade(db: &Database, id: &str) -> Result<bool, PortalError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM messages WHERE sender_id = ?1 OR receiver_id = ?1",
                params![id],
            )?;
            let deleted = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_developers: i64,
    pub total_testers: i64,
    pub online_users: i64,
    pub total_messages: i64,
    pub recent_users: Vec<User>,
}

/// Compute the admin dashboard aggregates in one round trip.
pub async fn dashboard_stats(db: &Database) -> Result<DashboardStats, PortalError> {
    db.connection()
        .call(move |conn| {
            let count = |sql: &str| -> rusqlite::Result<i64> {
                conn.query_row(sql, [], |row| row.get(0))
            };
            let total_users = count("SELECT COUNT(*) FROM users WHERE role != 'admin'")?;
            let total_developers = count("SELECT COUNT(*) FROM users WHERE role = 'developer'")?;
            let total_testers = count("SELECT COUNT(*) FROM users WHERE role = 'tester'")?;
            let online_users =
                count("SELECT COUNT(*) FROM users WHERE is_online = 1 AND role != 'admin'")?;
            let total_messages = count("SELECT COUNT(*) FROM messages")?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role != 'admin'
                 ORDER BY created_at DESC LIMIT 5"
            ))?;
            let rows = stmt.query_map([], user_from_row)?;
            let mut recent_users = Vec::new();
            for row in rows {
                recent_users.push(row?);
            }

            Ok(DashboardStats {
                total_users,
                total_developers,
                total_testers,
                online_users,
                total_messages,
                recent_users,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: format!("User {id}"),
            email: format!("{id}@example.com"),
            employee_id: format!("EMP-{id}"),
            password_hash: "$argon2id$test".to_string(),
            role,
            is_online: false,
            last_seen: "2026-01-01T00:00:00.000Z".to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_user_round_trips() {
        let (db, _dir) = setup_db().await;
        let user = make_user("u1", Role::Tester);

        create_user(&db, &user).await.unwrap();
        let fetched = get_user(&db, "u1").await.unwrap().unwrap();
        assert_eq!(fetched.email, "u1@example.com");
        assert_eq!(fetched.role, Role::Tester);
        assert!(!fetched.is_online);

        let by_email = get_user_by_email(&db, "u1@example.com").await.unwrap();
        assert_eq!(by_email.unwrap().id, "u1");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_nonexistent_user_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_user(&db, "nobody").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_email_detection() {
        let (db, _dir) = setup_db().await;
        create_user(&db, &make_user("u1", Role::Tester)).await.unwrap();

        assert!(email_or_employee_id_exists(&db, "u1@example.com", "EMP-x")
            .await
            .unwrap());
        assert!(email_or_employee_id_exists(&db, "x@example.com", "EMP-u1")
            .await
            .unwrap());
        assert!(!email_or_employee_id_exists(&db, "x@example.com", "EMP-x")
            .await
            .unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn role_listing_excludes_other_roles() {
        let (db, _dir) = setup_db().await;
        create_user(&db, &make_user("t1", Role::Tester)).await.unwrap();
        create_user(&db, &make_user("d1", Role::Developer)).await.unwrap();
        create_user(&db, &make_user("a1", Role::Admin)).await.unwrap();

        let testers = list_users_by_role(&db, Role::Tester).await.unwrap();
        assert_eq!(testers.len(), 1);
        assert_eq!(testers[0].id, "t1");

        let non_admin = list_non_admin_users(&db).await.unwrap();
        assert_eq!(non_admin.len(), 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn online_flag_and_last_seen_update() {
        let (db, _dir) = setup_db().await;
        create_user(&db, &make_user("u1", Role::Tester)).await.unwrap();

        set_online(&db, "u1").await.unwrap();
        assert!(get_user(&db, "u1").await.unwrap().unwrap().is_online);

        set_offline(&db, "u1", "2026-02-02T10:00:00.000Z").await.unwrap();
        let user = get_user(&db, "u1").await.unwrap().unwrap();
        assert!(!user.is_online);
        assert_eq!(user.last_seen, "2026-02-02T10:00:00.000Z");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_cascade_returns_false_for_missing_user() {
        let (db, _dir) = setup_db().await;
        assert!(!delete_user_cascade(&db, "nobody").await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dashboard_stats_counts_roles_and_online() {
        let (db, _dir) = setup_db().await;
        create_user(&db, &make_user("t1", Role::Tester)).await.unwrap();
        create_user(&db, &make_user("t2", Role::Tester)).await.unwrap();
        create_user(&db, &make_user("d1", Role::Developer)).await.unwrap();
        create_user(&db, &make_user("a1", Role::Admin)).await.unwrap();
        set_online(&db, "t1").await.unwrap();

        let stats = dashboard_stats(&db).await.unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.total_testers, 2);
        assert_eq!(stats.total_developers, 1);
        assert_eq!(stats.online_users, 1);
        assert_eq!(stats.total_messages, 0);
        assert_eq!(stats.recent_users.len(), 3);
        db.close().await.unwrap();
    }
}
