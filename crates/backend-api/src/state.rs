use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use quill_auth::{SessionManager, User, UserAuth};

use crate::{ApiError, CookieBinder};

#[derive(Clone)]
pub struct AppState {
    sessions: SessionManager,
    cookies: CookieBinder,
}

impl AppState {
    pub fn new(sessions: SessionManager, cookies: CookieBinder) -> Self {
        Self { sessions, cookies }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn cookies(&self) -> &CookieBinder {
        &self.cookies
    }

    /// Resolve the caller's session, failing with 401 for anonymous requests.
    pub async fn authenticate(
        &self,
        jar: &CookieJar,
        headers: &HeaderMap,
    ) -> Result<(User, UserAuth, String), ApiError> {
        let token = self
            .cookies
            .extract(jar, headers)
            .ok_or_else(|| ApiError::unauthorized("authentication required"))?;

        let (user, session) = self.sessions.resolve_session(&token).await?;
        Ok((user, session, token))
    }
}
