// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use chatportal_core::PortalError;
use chatportal_realtime::{ProtocolHandler, SessionRegistry};
use chatportal_storage::Database;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Storage handle.
    pub db: Database,
    /// Live-connection registry, shared with the protocol handler.
    pub registry: Arc<SessionRegistry>,
    /// The messaging protocol dispatcher driving WebSocket connections.
    pub protocol: ProtocolHandler,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

impl GatewayState {
    pub fn new(db: Database, auth: AuthConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let protocol = ProtocolHandler::new(db.clone(), Arc::clone(&registry));
        GatewayState {
            db,
            registry,
            protocol,
            auth,
        }
    }
}

/// Gateway server configuration (mirrors ServerConfig from chatportal-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the full gateway router over `state`.
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    // Unauthenticated public routes.
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/api/auth/register", post(handlers::post_register))
        .route("/api/auth/login", post(handlers::post_login))
        .with_state(state.clone());

    // Routes requiring a bearer token.
    let api_routes = Router::new()
        .route("/api/users", get(handlers::get_users))
        .route("/api/messages/unread/count", get(handlers::get_unread_counts))
        .route("/api/messages/{user_id}", get(handlers::get_conversation))
        .route("/api/admin/users", get(handlers::get_admin_users))
        .route("/api/admin/users/{id}", delete(handlers::delete_admin_user))
        .route("/api/admin/history/{id}", get(handlers::get_admin_history))
        .route(
            "/api/admin/history/{id}/export",
            get(handlers::get_admin_history_export),
        )
        .route("/api/admin/stats", get(handlers::get_admin_stats))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    // WebSocket route (auth happens during handshake, not via middleware).
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway HTTP/WebSocket server. Runs until the process exits.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), PortalError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| PortalError::Gateway {
                message: format!("failed to bind gateway to {addr}: {e}"),
                source: Some(Box::new(e)),
            })?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| PortalError::Gateway {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn gateway_state_is_clone() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let state = GatewayState::new(
            db,
            AuthConfig {
                token_secret: Some("secret".to_string()),
                token_ttl_hours: 1,
            },
        );
        let cloned = state.clone();
        // Both clones share one registry.
        assert!(Arc::ptr_eq(&state.registry, &cloned.registry));
    }

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }
}
