// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for the real-time chat protocol.
//!
//! Client -> Server (JSON, adjacently tagged):
//! ```json
//! {"type": "user-connected", "data": {"user_id": "..."}}
//! {"type": "send-message", "data": {"sender_id": "...", "receiver_id": "...", "body": "hi"}}
//! ```
//!
//! Server -> Client: [`chatportal_core::ServerEvent`] frames in the same
//! shape. The token is validated during the handshake via a query
//! parameter; the announced identity must match the token subject.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use chatportal_core::{ClientEvent, Role, ServerEvent};
use chatportal_realtime::{ConnHandle, Connection};

use crate::auth::Claims;
use crate::server::GatewayState;

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    token: Option<String>,
}

/// WebSocket upgrade handler. The token is checked before upgrading;
/// a bad or missing token never reaches the protocol layer.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<GatewayState>,
) -> Response {
    let Some(ref secret) = state.auth.token_secret else {
        tracing::error!("gateway has no token secret configured -- rejecting websocket");
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let claims = match params.token.as_deref().map(|t| crate::auth::verify_token(secret, t)) {
        Some(Ok(claims)) => claims,
        Some(Err(e)) => {
            tracing::debug!(error = %e, "websocket token rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
        None => return StatusCode::UNAUTHORIZED.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, claims))
}

/// Run one WebSocket connection to completion.
///
/// Spawns a writer task draining the connection's event queue and runs the
/// read loop inline; frames are processed sequentially, which is what
/// guarantees per-pair delivery order.
async fn handle_socket(socket: WebSocket, state: GatewayState, claims: Claims) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (handle, mut rx) = ConnHandle::new();
    let mut conn = Connection::new(handle);

    let writer_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode server event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let event: ClientEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "invalid websocket frame skipped");
                        continue;
                    }
                };
                if let Some(denial) = authorize(&claims, &event) {
                    conn.handle()
                        .push(ServerEvent::Error { message: denial })
                        .await;
                    continue;
                }
                state.protocol.handle_event(&mut conn, event).await;
            }
            Message::Close(_) => break,
            _ => {} // Binary, ping, pong: nothing to do.
        }
    }

    state.protocol.disconnect(&conn).await;
    writer_task.abort();
}

/// Check an inbound event against the handshake token. Returns a denial
/// message for events the token does not cover.
fn authorize(claims: &Claims, event: &ClientEvent) -> Option<String> {
    match event {
        ClientEvent::UserConnected { user_id } if user_id.as_str() != claims.sub => {
            Some("announced identity does not match token".to_string())
        }
        ClientEvent::AdminConnected if claims.role != Role::Admin => {
            Some("admin token required".to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatportal_core::UserId;

    fn claims(sub: &str, role: Role) -> Claims {
        Claims::new(sub, role, 1)
    }

    #[test]
    fn announce_must_match_token_subject() {
        let event = ClientEvent::UserConnected {
            user_id: UserId("u2".to_string()),
        };
        assert!(authorize(&claims("u1", Role::Tester), &event).is_some());

        let event = ClientEvent::UserConnected {
            user_id: UserId("u1".to_string()),
        };
        assert!(authorize(&claims("u1", Role::Tester), &event).is_none());
    }

    #[test]
    fn observer_announce_requires_admin_role() {
        assert!(authorize(&claims("u1", Role::Tester), &ClientEvent::AdminConnected).is_some());
        assert!(authorize(&claims("a1", Role::Admin), &ClientEvent::AdminConnected).is_none());
    }

    #[test]
    fn other_events_pass_through() {
        let event = ClientEvent::Typing {
            sender_id: UserId("u1".to_string()),
            receiver_id: UserId("u2".to_string()),
            is_typing: true,
        };
        assert!(authorize(&claims("u1", Role::Tester), &event).is_none());
    }
}
