// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the chatportal workspace.
//!
//! Timestamps are RFC 3339 strings with millisecond precision throughout;
//! they double as the sole ordering key for the message log.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Account role. Regular users are testers or developers and chat with the
/// opposite role; admins observe and manage accounts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tester,
    Developer,
    Admin,
}

impl Role {
    /// The role a regular user chats with. Admins have no opposite.
    pub fn opposite(&self) -> Option<Role> {
        match self {
            Role::Tester => Some(Role::Developer),
            Role::Developer => Some(Role::Tester),
            Role::Admin => None,
        }
    }
}

/// A user account as persisted in storage.
///
/// `password_hash` never leaves the server; it is skipped on serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub employee_id: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub is_online: bool,
    pub last_seen: String,
    pub created_at: String,
}

/// Descriptor for a file attached to a message. The file itself is hosted
/// elsewhere; the log stores only this descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub file_url: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
}

/// A message as persisted in the log. Stores participant ids only;
/// denormalized views are assembled at push time.
///
/// Invariant: at least one of `body` / `file` is present. A captioned file
/// carries both. `is_read` flips false to true exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: Option<String>,
    pub file: Option<FileAttachment>,
    pub is_read: bool,
    pub created_at: String,
}

impl MessageRecord {
    /// True when the record satisfies the body-or-file invariant.
    pub fn has_content(&self) -> bool {
        self.body.as_deref().is_some_and(|b| !b.is_empty()) || self.file.is_some()
    }
}

/// Sender/receiver identity attached to pushed messages (a read-side join
/// performed at write time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for Participant {
    fn from(user: &User) -> Self {
        Participant {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// A message denormalized with participant display data, as delivered to
/// live connections and returned by the history endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub sender: Participant,
    pub receiver: Participant,
    pub body: Option<String>,
    pub file: Option<FileAttachment>,
    pub is_read: bool,
    pub created_at: String,
}

impl MessageView {
    pub fn from_record(record: MessageRecord, sender: &User, receiver: &User) -> Self {
        MessageView {
            id: record.id,
            sender: sender.into(),
            receiver: receiver.into(),
            body: record.body,
            file: record.file,
            is_read: record.is_read,
            created_at: record.created_at,
        }
    }
}

/// Current time as an RFC 3339 string with millisecond precision.
pub fn now_rfc3339() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        use std::str::FromStr;
        for role in [Role::Tester, Role::Developer, Role::Admin] {
            let s = role.to_string();
            assert_eq!(Role::from_str(&s).unwrap(), role);
        }
        assert_eq!(Role::Tester.to_string(), "tester");
    }

    #[test]
    fn opposite_role_pairs_testers_with_developers() {
        assert_eq!(Role::Tester.opposite(), Some(Role::Developer));
        assert_eq!(Role::Developer.opposite(), Some(Role::Tester));
        assert_eq!(Role::Admin.opposite(), None);
    }

    #[test]
    fn user_serialization_omits_password_hash() {
        let user = User {
            id: "u1".into(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            employee_id: "EMP-1".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Tester,
            is_online: false,
            last_seen: "2026-01-01T00:00:00.000Z".into(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn message_content_invariant() {
        let mut record = MessageRecord {
            id: "m1".into(),
            sender_id: "u1".into(),
            receiver_id: "u2".into(),
            body: None,
            file: None,
            is_read: false,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        assert!(!record.has_content());

        record.body = Some("".into());
        assert!(!record.has_content());

        record.body = Some("hi".into());
        assert!(record.has_content());

        record.body = None;
        record.file = Some(FileAttachment {
            file_url: "/uploads/a.pdf".into(),
            file_name: "a.pdf".into(),
            file_type: "application/pdf".into(),
            file_size: 1024,
        });
        assert!(record.has_content());
    }

    #[test]
    fn now_rfc3339_has_millis_and_utc_suffix() {
        let ts = now_rfc3339();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.matches('.').count(), 1);
    }
}
