// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses and non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::PortalConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PortalConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::Validation {
            message: "server.port must be non-zero".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // A present-but-empty secret is always a mistake; absence is checked at
    // serve time (fail-closed there, but `create-admin` works without one).
    if let Some(secret) = &config.auth.token_secret {
        if secret.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "auth.token_secret must not be empty when set".to_string(),
            });
        }
    }

    if config.auth.token_ttl_hours == 0 {
        errors.push(ConfigError::Validation {
            message: "auth.token_ttl_hours must be at least 1".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.log.level
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = PortalConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_all_errors_instead_of_failing_fast() {
        let mut config = PortalConfig::default();
        config.server.host = "".to_string();
        config.server.port = 0;
        config.storage.database_path = " ".to_string();
        config.log.level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn empty_secret_is_rejected_but_absent_secret_is_not() {
        let mut config = PortalConfig::default();
        config.auth.token_secret = Some("   ".to_string());
        assert!(validate_config(&config).is_err());

        config.auth.token_secret = None;
        assert!(validate_config(&config).is_ok());
    }
}
