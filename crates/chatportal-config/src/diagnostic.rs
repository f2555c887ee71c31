// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Converts Figment deserialization errors into miette diagnostics with
//! "did you mean?" suggestions using Jaro-Winkler string similarity.

use miette::Diagnostic;
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
/// 0.75 catches common typos like `prot` -> `port` and
/// `databse_path` -> `database_path` while filtering noise.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// All keys accepted anywhere in the configuration, used for suggestions.
const KNOWN_KEYS: &[&str] = &[
    "server",
    "storage",
    "auth",
    "log",
    "host",
    "port",
    "database_path",
    "wal_mode",
    "token_secret",
    "token_ttl_hours",
    "level",
];

/// A configuration error suitable for miette rendering.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration failed to parse or deserialize.
    #[error("{message}")]
    #[diagnostic(
        code(chatportal::config::parse),
        help("{}", suggestion.as_deref().unwrap_or("check the configuration file against the documented keys"))
    )]
    Parse {
        /// The underlying figment error message.
        message: String,
        /// "did you mean `key`?" when a close match exists.
        suggestion: Option<String>,
    },

    /// A semantic constraint was violated.
    #[error("{message}")]
    #[diagnostic(code(chatportal::config::validation))]
    Validation { message: String },
}

/// Suggest the closest known key for `input`, if any is similar enough.
pub fn suggest_key(input: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .map(|key| (*key, strsim::jaro_winkler(input, key)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key)
}

/// Convert a figment error into diagnostic config errors.
///
/// Each figment error may aggregate several problems; all are surfaced.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    err.into_iter()
        .map(|e| {
            let message = e.to_string();
            // figment reports unknown keys as `unknown field `naem`...`;
            // pull the offending key out for a suggestion.
            let suggestion = extract_backticked_key(&message)
                .and_then(suggest_key)
                .map(|key| format!("did you mean `{key}`?"));
            ConfigError::Parse {
                message,
                suggestion,
            }
        })
        .collect()
}

/// Render collected errors to stderr via miette.
pub fn render_errors(errors: &[ConfigError]) {
    for error in errors {
        eprintln!("{:?}", miette::Report::new(error.clone()));
    }
}

fn extract_backticked_key(message: &str) -> Option<&str> {
    let start = message.find('`')? + 1;
    let end = message[start..].find('`')? + start;
    Some(&message[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_key_for_typo() {
        assert_eq!(suggest_key("databse_path"), Some("database_path"));
        assert_eq!(suggest_key("prot"), Some("port"));
        assert_eq!(suggest_key("tokn_secret"), Some("token_secret"));
    }

    #[test]
    fn no_suggestion_for_unrelated_input() {
        assert_eq!(suggest_key("zzzzqqqq"), None);
    }

    #[test]
    fn extracts_backticked_key() {
        assert_eq!(
            extract_backticked_key("unknown field `prot`, expected one of"),
            Some("prot")
        );
        assert_eq!(extract_backticked_key("no ticks here"), None);
    }
}
