// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the chatportal server.
//!
//! Provides the error type, domain types, and WebSocket wire events used
//! throughout the workspace. Crates higher in the stack (storage, realtime,
//! gateway) depend only on what is defined here.

pub mod error;
pub mod events;
pub mod types;

pub use error::PortalError;
pub use events::{ClientEvent, ServerEvent};
pub use types::{
    now_rfc3339, FileAttachment, MessageId, MessageRecord, MessageView, Participant, Role, User,
    UserId,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_error_has_all_variants() {
        let _config = PortalError::Config("test".into());
        let _storage = PortalError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _gateway = PortalError::Gateway {
            message: "test".into(),
            source: None,
        };
        let _validation = PortalError::Validation("test".into());
        let _internal = PortalError::Internal("test".into());
    }

    #[test]
    fn validation_error_displays_message() {
        let err = PortalError::Validation("message must have a body or a file".into());
        assert_eq!(
            err.to_string(),
            "validation error: message must have a body or a file"
        );
    }
}
