use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use quill_auth::{SessionState, SessionSummary, User};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    pub settings: SettingsResponse,
    pub subscriptions_count: i64,
    pub subscribers_count: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub news_line_default: String,
    pub news_line_sort: String,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            email: value.email,
            name: value.name,
            role: value.role.as_str().to_string(),
            description: value.description,
            avatar_url: value.avatar_url,
            cover_url: value.cover_url,
            settings: SettingsResponse {
                news_line_default: value.settings.news_line_default,
                news_line_sort: value.settings.news_line_sort,
            },
            subscriptions_count: value.subscriptions_count,
            subscribers_count: value.subscribers_count,
            created_at: value.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub id: String,
    pub device_label: String,
    /// One of `active`, `revoked`, `expired`.
    pub state: String,
    pub issued_at: String,
    pub expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<String>,
    /// Whether this is the session making the request.
    pub current: bool,
}

impl SessionView {
    fn new(summary: SessionSummary, current_id: &str) -> Self {
        let state = match summary.state {
            SessionState::Active => "active",
            SessionState::Revoked => "revoked",
            SessionState::Expired => "expired",
        };
        Self {
            current: summary.id == current_id,
            id: summary.id,
            device_label: summary.device_label,
            state: state.to_string(),
            issued_at: summary.issued_at.to_rfc3339(),
            expires_at: summary.expires_at.to_rfc3339(),
            revoked_at: summary.revoked_at.map(|at| at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionView>,
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearerAuth" = []), ("cookieAuth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let (user, _, _) = state.authenticate(&jar, &headers).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    get,
    path = "/api/users/sessions",
    tag = "Users",
    security(("bearerAuth" = []), ("cookieAuth" = [])),
    responses(
        (status = 200, description = "The caller's device sessions, newest first", body = SessionsResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<SessionsResponse>, ApiError> {
    let (user, current, _) = state.authenticate(&jar, &headers).await?;
    let sessions = state
        .sessions()
        .list_sessions(&user.id)
        .await?
        .into_iter()
        .map(|summary| SessionView::new(summary, &current.id))
        .collect();

    Ok(Json(SessionsResponse { sessions }))
}

/// Revoke one of the caller's sessions. Unknown ids succeed; revoking the
/// current session also clears the cookie.
#[utoipa::path(
    delete,
    path = "/api/users/sessions/{session_id}",
    tag = "Users",
    security(("bearerAuth" = []), ("cookieAuth" = [])),
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn revoke_session(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<(StatusCode, CookieJar), ApiError> {
    let (user, current, _) = state.authenticate(&jar, &headers).await?;
    state.sessions().revoke_for_user(&user, &session_id).await?;

    let jar = if session_id == current.id {
        state.cookies().clear(jar)
    } else {
        jar
    };
    Ok((StatusCode::NO_CONTENT, jar))
}
