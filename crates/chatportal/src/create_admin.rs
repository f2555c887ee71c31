// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatportal create-admin` command implementation.
//!
//! Admin accounts never go through the public registration endpoint; they
//! are provisioned here, on the box, with a password prompted off-terminal.

use chatportal_config::PortalConfig;
use chatportal_core::{now_rfc3339, PortalError, Role, User};
use chatportal_gateway::auth::hash_password;
use chatportal_storage::{queries, Database};

/// Runs the `chatportal create-admin` command.
pub async fn run_create_admin(
    config: PortalConfig,
    name: String,
    email: String,
    employee_id: String,
) -> Result<(), PortalError> {
    let email = email.trim().to_lowercase();
    if name.trim().is_empty() || email.is_empty() || employee_id.trim().is_empty() {
        return Err(PortalError::Validation(
            "name, email and employee id must be non-empty".to_string(),
        ));
    }

    let password = rpassword::prompt_password("Admin password: ").map_err(|e| {
        PortalError::Internal(format!("failed to read password: {e}"))
    })?;
    if password.len() < 6 {
        return Err(PortalError::Validation(
            "password must be at least 6 characters".to_string(),
        ));
    }
    let confirm = rpassword::prompt_password("Confirm password: ").map_err(|e| {
        PortalError::Internal(format!("failed to read password: {e}"))
    })?;
    if password != confirm {
        return Err(PortalError::Validation("passwords do not match".to_string()));
    }

    let db = Database::open_with_options(&config.storage.database_path, config.storage.wal_mode)
        .await?;

    let password_hash = hash_password(&password)?;
    match queries::users::get_user_by_email(&db, &email).await? {
        Some(existing) if existing.role == Role::Admin => {
            // Existing admin: rotate the password in place.
            queries::users::update_password(&db, &existing.id, &password_hash).await?;
            println!("admin password updated for {email}");
        }
        Some(_) => {
            return Err(PortalError::Validation(format!(
                "{email} belongs to a non-admin account"
            )));
        }
        None => {
            let now = now_rfc3339();
            let user = User {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.trim().to_string(),
                email: email.clone(),
                employee_id: employee_id.trim().to_string(),
                password_hash,
                role: Role::Admin,
                is_online: false,
                last_seen: now.clone(),
                created_at: now,
            };
            queries::users::create_user(&db, &user).await?;
            println!("admin account created: {email}");
        }
    }

    db.close().await
}
