// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./chatportal.toml` > `~/.config/chatportal/chatportal.toml`
//! > `/etc/chatportal/chatportal.toml` with environment variable overrides
//! via the `CHATPORTAL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PortalConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatportal/chatportal.toml` (system-wide)
/// 3. `~/.config/chatportal/chatportal.toml` (user XDG config)
/// 4. `./chatportal.toml` (local directory)
/// 5. `CHATPORTAL_*` environment variables
pub fn load_config() -> Result<PortalConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PortalConfig::default()))
        .merge(Toml::file("/etc/chatportal/chatportal.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chatportal/chatportal.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chatportal.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<PortalConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PortalConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PortalConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PortalConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CHATPORTAL_AUTH_TOKEN_SECRET` must map
/// to `auth.token_secret`, not `auth.token.secret`.
fn env_provider() -> Env {
    Env::prefixed("CHATPORTAL_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("auth_", "auth.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}
