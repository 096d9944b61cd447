use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use quill_auth::{AuthError, IssuedSession, NewUser, User};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{routes::users::UserResponse, util::user_agent, ApiError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignUpRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub session_id: String,
    pub device_label: String,
    pub expires_at: String,
    pub user: UserResponse,
}

impl SessionResponse {
    pub fn new(issued: IssuedSession, user: User) -> Self {
        Self {
            token: issued.token,
            session_id: issued.session.id,
            device_label: issued.session.device_label,
            expires_at: issued.session.expires_at.to_rfc3339(),
            user: user.into(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/users/sign-up",
    tag = "Auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created and session issued", body = SessionResponse),
        (status = 400, description = "Invalid sign-up payload", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>), ApiError> {
    let new_user = NewUser {
        email: payload.email,
        name: payload.name,
        password: payload.password,
        description: payload.description,
    };
    let (user, issued) = state
        .sessions()
        .sign_up(new_user, user_agent(&headers))
        .await?;

    let jar = state.cookies().attach(jar, &issued.token);
    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse::new(issued, user)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/users/sign-in",
    tag = "Auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid email or password", body = crate::error::ErrorResponse)
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(payload): Json<SignInRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let (user, issued) = state
        .sessions()
        .sign_in(&payload.email, &payload.password, user_agent(&headers))
        .await?;

    let jar = state.cookies().attach(jar, &issued.token);
    Ok((jar, Json(SessionResponse::new(issued, user))))
}

/// Revoke the session bound to the request and clear the cookie.
///
/// Always answers 204 for an unusable or missing token: the caller is
/// already signed out.
#[utoipa::path(
    post,
    path = "/api/users/sign-out",
    tag = "Auth",
    responses(
        (status = 204, description = "Signed out"),
        (status = 500, description = "Session store unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn sign_out(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(StatusCode, CookieJar), ApiError> {
    if let Some(token) = state.cookies().extract(&jar, &headers) {
        match state.sessions().resolve_session(&token).await {
            Ok((_, session)) => state.sessions().sign_out(&session.id).await?,
            Err(error @ (AuthError::Persistence { .. } | AuthError::Internal { .. })) => {
                return Err(error.into())
            }
            Err(error) => debug!(code = error.code(), "sign-out with unusable token"),
        }
    }

    let jar = state.cookies().clear(jar);
    Ok((StatusCode::NO_CONTENT, jar))
}

/// Rotate the caller's password. Every other session of the user is revoked;
/// the calling session survives and its token is returned again.
#[utoipa::path(
    post,
    path = "/api/users/password",
    tag = "Auth",
    security(("bearerAuth" = []), ("cookieAuth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = SessionResponse),
        (status = 400, description = "New password rejected by policy", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required or current password wrong", body = crate::error::ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let (user, session, token) = state.authenticate(&jar, &headers).await?;

    let user = state
        .sessions()
        .authenticate(&user.email, &payload.current_password)
        .await?;
    state
        .sessions()
        .change_password(&user, &payload.new_password, Some(&session.id))
        .await?;
    info!(user_id = %user.id, session_id = %session.id, "password changed");

    let jar = state.cookies().attach(jar, &token);
    let issued = IssuedSession { token, session };
    Ok((jar, Json(SessionResponse::new(issued, user))))
}
