// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatportal serve` command implementation.
//!
//! Opens the database, wires the real-time protocol into the gateway, and
//! serves HTTP/WebSocket until the process is stopped.

use chatportal_config::PortalConfig;
use chatportal_core::PortalError;
use chatportal_gateway::{server::ServerConfig, AuthConfig, GatewayState};
use chatportal_storage::Database;
use tracing::info;

/// Runs the `chatportal serve` command.
pub async fn run_serve(config: PortalConfig) -> Result<(), PortalError> {
    init_tracing(&config.log.level);

    // Serving without a token secret would reject every request; refuse
    // to start instead of coming up dead.
    if config.auth.token_secret.is_none() {
        return Err(PortalError::Config(
            "auth.token_secret must be set to serve (set CHATPORTAL_AUTH_TOKEN_SECRET or [auth] token_secret)"
                .to_string(),
        ));
    }

    let db = Database::open_with_options(&config.storage.database_path, config.storage.wal_mode)
        .await?;
    info!(path = %config.storage.database_path, "database ready");

    let state = GatewayState::new(
        db,
        AuthConfig {
            token_secret: config.auth.token_secret.clone(),
            token_ttl_hours: config.auth.token_ttl_hours,
        },
    );
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    chatportal_gateway::start_server(&server_config, state).await
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatportal={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
