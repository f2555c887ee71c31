// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Auth endpoints are public; everything else runs behind the bearer
//! middleware and reads the verified [`Claims`] from request extensions.
//! Admin endpoints additionally require an admin-role token.

use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use chatportal_core::{now_rfc3339, MessageView, PortalError, Role, User, UserId};
use chatportal_realtime::unread;
use chatportal_storage::{queries, Database};

use crate::auth::{hash_password, issue_token, verify_password, Claims};
use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// A handler-level failure carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }
}

impl From<PortalError> for ApiError {
    fn from(e: PortalError) -> Self {
        match e {
            PortalError::Validation(message) => ApiError::new(StatusCode::BAD_REQUEST, message),
            other => {
                tracing::error!(error = %other, "request failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn require_admin(claims: &Claims) -> Result<(), ApiError> {
    if claims.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::new(StatusCode::FORBIDDEN, "admin role required"))
    }
}

/// Request body for POST /api/auth/register.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub employee_id: String,
    pub password: String,
    pub role: Role,
}

/// Response body for POST /api/auth/login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Request body for POST /api/auth/login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// GET /health (public).
pub async fn get_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/auth/register (public).
///
/// Creates a tester or developer account. Admin accounts are provisioned
/// from the CLI only.
pub async fn post_register(
    State(state): State<GatewayState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.name.trim().is_empty() || body.email.trim().is_empty() || body.employee_id.trim().is_empty()
    {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "name, email and employee_id are required",
        ));
    }
    if body.password.len() < 6 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "password must be at least 6 characters",
        ));
    }
    if body.role == Role::Admin {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "role must be tester or developer",
        ));
    }
    if queries::users::email_or_employee_id_exists(&state.db, &body.email, &body.employee_id)
        .await?
    {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "email or employee id already registered",
        ));
    }

    let now = now_rfc3339();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        email: body.email.trim().to_lowercase(),
        employee_id: body.employee_id.trim().to_string(),
        password_hash: hash_password(&body.password)?,
        role: body.role,
        is_online: false,
        last_seen: now.clone(),
        created_at: now,
    };
    queries::users::create_user(&state.db, &user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "account registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login (public).
pub async fn post_login(
    State(state): State<GatewayState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(ref secret) = state.auth.token_secret else {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "authentication is not configured",
        ));
    };

    let email = body.email.trim().to_lowercase();
    let user = queries::users::get_user_by_email(&state.db, &email).await?;
    let Some(user) = user.filter(|u| verify_password(&body.password, &u.password_hash)) else {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "invalid email or password",
        ));
    };

    let claims = Claims::new(&user.id, user.role, state.auth.token_ttl_hours);
    let token = issue_token(secret, &claims)?;
    tracing::info!(user_id = %user.id, "login");

    Ok(Json(LoginResponse { token, user }))
}

/// GET /api/users: chat partners for the caller: the opposite role for
/// regular users, every non-admin account for admins.
pub async fn get_users(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = match claims.role.opposite() {
        None => queries::users::list_non_admin_users_by_name(&state.db).await?,
        Some(role) => queries::users::list_users_by_role(&state.db, role).await?,
    };
    Ok(Json(users))
}

/// GET /api/messages/{user_id}: conversation between the caller and a
/// peer, ascending. Fetching the conversation marks the peer's messages to
/// the caller as read and refreshes the caller's live counter.
pub async fn get_conversation(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(peer_id): Path<String>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let caller = queries::users::get_user(&state.db, &claims.sub)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "account no longer exists"))?;
    let peer = queries::users::get_user(&state.db, &peer_id)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no such user"))?;

    let records = queries::messages::conversation(&state.db, &caller.id, &peer.id).await?;
    queries::messages::mark_read(&state.db, &peer.id, &caller.id).await?;
    unread::push_cleared(
        &state.registry,
        &UserId(peer.id.clone()),
        &UserId(caller.id.clone()),
    )
    .await;

    let views = records
        .into_iter()
        .map(|record| {
            let (sender, receiver) = if record.sender_id == caller.id {
                (&caller, &peer)
            } else {
                (&peer, &caller)
            };
            MessageView::from_record(record, sender, receiver)
        })
        .collect();
    Ok(Json(views))
}

/// GET /api/messages/unread/count: per-sender unread counters for the
/// caller (login-time badge state).
pub async fn get_unread_counts(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<BTreeMap<String, i64>>, ApiError> {
    let counts = unread::counts_for(&state.db, &UserId(claims.sub.clone())).await?;
    Ok(Json(counts.into_iter().map(|(id, n)| (id.0, n)).collect()))
}

/// GET /api/admin/users: every non-admin account, newest first.
pub async fn get_admin_users(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<User>>, ApiError> {
    require_admin(&claims)?;
    let users = queries::users::list_non_admin_users(&state.db).await?;
    Ok(Json(users))
}

/// DELETE /api/admin/users/{id}: remove an account and its messages.
/// Admin accounts cannot be deleted through the API.
pub async fn delete_admin_user(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&claims)?;
    let user = queries::users::get_user(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no such user"))?;
    if user.role == Role::Admin {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "admin accounts cannot be deleted",
        ));
    }
    queries::users::delete_user_cascade(&state.db, &id).await?;
    tracing::info!(user_id = %id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Date-range filter for the admin history endpoints. Date-only values are
/// widened to cover the whole day.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl HistoryParams {
    fn bounds(&self) -> (Option<String>, Option<String>) {
        let widen = |value: &str, suffix: &str| {
            if value.len() == 10 {
                format!("{value}{suffix}")
            } else {
                value.to_string()
            }
        };
        (
            self.start_date.as_deref().map(|s| widen(s, "T00:00:00.000Z")),
            self.end_date.as_deref().map(|e| widen(e, "T23:59:59.999Z")),
        )
    }
}

/// GET /api/admin/history/{id}: audit view of everything a user sent or
/// received, optionally bounded by `start_date` / `end_date`.
pub async fn get_admin_history(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    require_admin(&claims)?;
    let views = history_views(&state.db, &id, &params).await?;
    Ok(Json(views))
}

/// GET /api/admin/history/{id}/export: the same audit view as a CSV
/// download.
pub async fn get_admin_history_export(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Response, ApiError> {
    require_admin(&claims)?;
    let views = history_views(&state.db, &id, &params).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "id",
            "sender",
            "receiver",
            "body",
            "file_name",
            "file_url",
            "is_read",
            "created_at",
        ])
        .map_err(csv_error)?;
    for view in &views {
        writer
            .write_record([
                view.id.as_str(),
                view.sender.name.as_str(),
                view.receiver.name.as_str(),
                view.body.as_deref().unwrap_or(""),
                view.file.as_ref().map(|f| f.file_name.as_str()).unwrap_or(""),
                view.file.as_ref().map(|f| f.file_url.as_str()).unwrap_or(""),
                if view.is_read { "true" } else { "false" },
                view.created_at.as_str(),
            ])
            .map_err(csv_error)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"chat-history.csv\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

fn csv_error(e: csv::Error) -> ApiError {
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Response body for GET /api/admin/stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_users: i64,
    pub total_developers: i64,
    pub total_testers: i64,
    pub online_users: i64,
    pub total_messages: i64,
    pub recent_users: Vec<User>,
}

/// GET /api/admin/stats: dashboard aggregates.
pub async fn get_admin_stats(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StatsResponse>, ApiError> {
    require_admin(&claims)?;
    let stats = queries::users::dashboard_stats(&state.db).await?;
    Ok(Json(StatsResponse {
        total_users: stats.total_users,
        total_developers: stats.total_developers,
        total_testers: stats.total_testers,
        online_users: stats.online_users,
        total_messages: stats.total_messages,
        recent_users: stats.recent_users,
    }))
}

async fn history_views(
    db: &Database,
    user_id: &str,
    params: &HistoryParams,
) -> Result<Vec<MessageView>, ApiError> {
    let (start, end) = params.bounds();
    let records = queries::messages::messages_for_user(db, user_id, start, end).await?;

    let mut cache: HashMap<String, User> = HashMap::new();
    let mut views = Vec::with_capacity(records.len());
    for record in records {
        let Some(sender) = lookup_cached(db, &mut cache, &record.sender_id).await? else {
            tracing::warn!(message_id = %record.id, "sender missing, row skipped");
            continue;
        };
        let Some(receiver) = lookup_cached(db, &mut cache, &record.receiver_id).await? else {
            tracing::warn!(message_id = %record.id, "receiver missing, row skipped");
            continue;
        };
        views.push(MessageView::from_record(record, &sender, &receiver));
    }
    Ok(views)
}

async fn lookup_cached(
    db: &Database,
    cache: &mut HashMap<String, User>,
    id: &str,
) -> Result<Option<User>, ApiError> {
    if let Some(user) = cache.get(id) {
        return Ok(Some(user.clone()));
    }
    match queries::users::get_user(db, id).await? {
        Some(user) => {
            cache.insert(id.to_string(), user.clone());
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_deserializes() {
        let json = r#"{
            "name": "Alice",
            "email": "alice@example.com",
            "employee_id": "EMP-1",
            "password": "hunter2",
            "role": "tester"
        }"#;
        let req: RegisterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Alice");
        assert_eq!(req.role, Role::Tester);
    }

    #[test]
    fn register_request_rejects_unknown_role() {
        let json = r#"{
            "name": "Alice",
            "email": "alice@example.com",
            "employee_id": "EMP-1",
            "password": "hunter2",
            "role": "superuser"
        }"#;
        assert!(serde_json::from_str::<RegisterRequest>(json).is_err());
    }

    #[test]
    fn history_params_widen_date_only_bounds() {
        let params = HistoryParams {
            start_date: Some("2026-03-01".to_string()),
            end_date: Some("2026-03-05".to_string()),
        };
        let (start, end) = params.bounds();
        assert_eq!(start.as_deref(), Some("2026-03-01T00:00:00.000Z"));
        assert_eq!(end.as_deref(), Some("2026-03-05T23:59:59.999Z"));
    }

    #[test]
    fn history_params_pass_full_timestamps_through() {
        let params = HistoryParams {
            start_date: Some("2026-03-01T12:00:00.000Z".to_string()),
            end_date: None,
        };
        let (start, end) = params.bounds();
        assert_eq!(start.as_deref(), Some("2026-03-01T12:00:00.000Z"));
        assert!(end.is_none());
    }

    #[test]
    fn error_response_serializes() {
        let resp = ErrorResponse {
            error: "something went wrong".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("something went wrong"));
    }
}
