//! The session manager: authenticates credentials and issues, resolves and
//! revokes per-device session tokens.
//!
//! Session lifecycle is `issued -> active -> (revoked | expired)`; both end
//! states are terminal. The repository is the only source of truth, so the
//! manager holds no session cache and is cheap to clone across requests.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::credentials::CredentialStore;
use crate::device::DeviceResolver;
use crate::entities::{NewUser, SessionState, User, UserAuth, UserRole, UserSettings};
use crate::error::{AuthError, AuthResult, RepositoryError};
use crate::policy::{DefaultPasswordPolicy, PasswordPolicy};
use crate::repository::{AuthRepository, UserRepository};
use crate::token::{generate_session_id, TokenSigner};
use crate::validation::{normalize_email, validate_email, validate_name};

/// Longest session lifetime the manager issues: one hundred years. Keeps every
/// expiry inside four-digit RFC3339 years.
pub const MAX_SESSION_TTL_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub ttl: Duration,
}

impl SessionPolicy {
    /// Saturates at [`MAX_SESSION_TTL_SECONDS`].
    pub fn from_ttl_seconds(seconds: u64) -> Self {
        let seconds = i64::try_from(seconds)
            .unwrap_or(i64::MAX)
            .min(MAX_SESSION_TTL_SECONDS);
        Self {
            ttl: Duration::seconds(seconds),
        }
    }

    fn bounded_ttl(&self) -> Duration {
        self.ttl.min(Duration::seconds(MAX_SESSION_TTL_SECONDS))
    }
}

/// A persisted session and the signed token bound to it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: UserAuth,
}

/// Read-only view of one of a user's device sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub device_label: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub state: SessionState,
}

impl SessionSummary {
    fn at(session: UserAuth, now: DateTime<Utc>) -> Self {
        let state = session.state_at(now);
        Self {
            id: session.id,
            device_label: session.device_label,
            issued_at: session.issued_at,
            expires_at: session.expires_at,
            revoked_at: session.revoked_at,
            state,
        }
    }
}

#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn AuthRepository>,
    signer: Arc<TokenSigner>,
    credentials: CredentialStore,
    devices: DeviceResolver,
    password_policy: Arc<dyn PasswordPolicy>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn AuthRepository>,
        signer: Arc<TokenSigner>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            users,
            sessions,
            signer,
            credentials: CredentialStore::default(),
            devices: DeviceResolver::new(),
            password_policy: Arc::new(DefaultPasswordPolicy::default()),
            policy,
        }
    }

    pub fn with_password_policy(mut self, password_policy: Arc<dyn PasswordPolicy>) -> Self {
        self.password_policy = password_policy;
        self
    }

    pub fn session_ttl(&self) -> Duration {
        self.policy.ttl
    }

    /// Check an email/password pair. Unknown accounts and wrong passwords are
    /// distinct errors internally but render identically.
    pub async fn authenticate(&self, email: &str, plaintext_password: &str) -> AuthResult<User> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await
            .map_err(AuthError::persistence("session.authenticate"))?;

        let Some(user) = user else {
            self.credentials.verify_dummy(plaintext_password);
            debug!("authentication rejected: no such account");
            return Err(AuthError::NotFound);
        };

        if !self
            .credentials
            .verify(plaintext_password, &user.encrypted_password, &user.salt)
        {
            debug!(user_id = %user.id, "authentication rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Issue a session for `(user, device_label)`, superseding any earlier
    /// non-revoked session for the same device.
    ///
    /// The token is returned only after the session row is durably written.
    /// The write runs on its own task so that dropping the caller cannot leave
    /// it half done.
    pub async fn authorize(&self, user: &User, device_label: &str) -> AuthResult<IssuedSession> {
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(self.policy.bounded_ttl())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let session = UserAuth::new(
            generate_session_id(),
            user.id.clone(),
            device_label.to_string(),
            issued_at,
            expires_at,
        );
        let token = self.signer.sign(&session.id, issued_at, expires_at)?;

        let sessions = Arc::clone(&self.sessions);
        let record = session.clone();
        tokio::spawn(async move { supersede_and_create(sessions.as_ref(), record).await })
            .await
            .map_err(|join_error| AuthError::Persistence {
                op: "session.authorize",
                source: RepositoryError::Backend(join_error.to_string()),
            })??;

        info!(
            user_id = %user.id,
            session_id = %session.id,
            device = %session.device_label,
            "session issued"
        );
        Ok(IssuedSession { token, session })
    }

    /// Resolve a token to its live session and owner.
    ///
    /// The token's own expiry claim and the stored revocation state are both
    /// checked; neither substitutes for the other.
    pub async fn resolve_session(&self, token: &str) -> AuthResult<(User, UserAuth)> {
        let claims = self.signer.verify(token)?;

        let session = self
            .sessions
            .get_by_id(&claims.sid)
            .await
            .map_err(AuthError::persistence("session.resolve"))?
            .ok_or(AuthError::SessionRevoked)?;

        match session.state_at(Utc::now()) {
            SessionState::Active => {}
            SessionState::Revoked => return Err(AuthError::SessionRevoked),
            SessionState::Expired => return Err(AuthError::TokenExpired),
        }

        let user = self
            .users
            .find_by_auth_id(&session.id)
            .await
            .map_err(AuthError::persistence("session.resolve"))?
            .ok_or(AuthError::SessionRevoked)?;

        Ok((user, session))
    }

    pub async fn resolve_token(&self, token: &str) -> AuthResult<User> {
        self.resolve_session(token).await.map(|(user, _)| user)
    }

    /// Revoke a session. Unknown and already-revoked ids succeed as no-ops.
    pub async fn revoke(&self, session_id: &str) -> AuthResult<()> {
        let session = self
            .sessions
            .get_by_id(session_id)
            .await
            .map_err(AuthError::persistence("session.revoke"))?;

        match session {
            Some(session) if !session.is_revoked() => {
                self.mark_revoked(session, Utc::now(), "session.revoke").await
            }
            _ => {
                debug!(session_id, "revoke skipped: session absent or already revoked");
                Ok(())
            }
        }
    }

    /// Revoke one of `user`'s own sessions. Another user's session is treated as absent.
    pub async fn revoke_for_user(&self, user: &User, session_id: &str) -> AuthResult<()> {
        let session = self
            .sessions
            .get_by_id(session_id)
            .await
            .map_err(AuthError::persistence("session.revoke"))?;

        match session {
            Some(session) if session.user_id == user.id && !session.is_revoked() => {
                self.mark_revoked(session, Utc::now(), "session.revoke").await
            }
            _ => Ok(()),
        }
    }

    /// Replace the user's password and revoke every session except `keep_session`.
    /// Returns how many sessions were revoked.
    pub async fn rotate_credential(
        &self,
        user: &User,
        new_plaintext: &str,
        keep_session: Option<&str>,
    ) -> AuthResult<usize> {
        self.password_policy.check(new_plaintext)?;
        let hashed = self.credentials.hash(new_plaintext)?;

        self.users
            .update_credentials(&user.id, &hashed.encrypted_password, &hashed.salt)
            .await
            .map_err(AuthError::persistence("session.rotate_credential"))?;

        let now = Utc::now();
        let mut revoked = 0;
        for session in self
            .sessions
            .list_for_user(&user.id)
            .await
            .map_err(AuthError::persistence("session.rotate_credential"))?
        {
            if session.is_revoked() || Some(session.id.as_str()) == keep_session {
                continue;
            }
            self.mark_revoked(session, now, "session.rotate_credential")
                .await?;
            revoked += 1;
        }

        info!(user_id = %user.id, revoked, "credential rotated");
        Ok(revoked)
    }

    pub async fn list_sessions(&self, user_id: &str) -> AuthResult<Vec<SessionSummary>> {
        let now = Utc::now();
        let sessions = self
            .sessions
            .list_for_user(user_id)
            .await
            .map_err(AuthError::persistence("session.list"))?;
        Ok(sessions
            .into_iter()
            .map(|session| SessionSummary::at(session, now))
            .collect())
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        device_descriptor: Option<&str>,
    ) -> AuthResult<(User, IssuedSession)> {
        let user = self.authenticate(email, password).await?;
        let device_label = self.devices.resolve(device_descriptor);
        let issued = self.authorize(&user, &device_label).await?;
        Ok((user, issued))
    }

    /// Create a personal account and immediately authorize the signing-up device.
    pub async fn sign_up(
        &self,
        new_user: NewUser,
        device_descriptor: Option<&str>,
    ) -> AuthResult<(User, IssuedSession)> {
        let email = normalize_email(&new_user.email);
        validate_email(&email)?;
        validate_name(&new_user.name)?;
        self.password_policy.check(&new_user.password)?;

        let existing = self
            .users
            .find_by_email(&email)
            .await
            .map_err(AuthError::persistence("user.sign_up"))?;
        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let hashed = self.credentials.hash(&new_user.password)?;
        let now = Utc::now();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name: new_user.name.trim().to_string(),
            encrypted_password: hashed.encrypted_password,
            salt: hashed.salt,
            role: UserRole::Personal,
            description: new_user.description,
            avatar_url: None,
            cover_url: None,
            settings: UserSettings::default(),
            subscriptions_count: 0,
            subscribers_count: 0,
            created_at: now,
            updated_at: now,
        };

        self.users
            .create_personal(&user)
            .await
            .map_err(|error| match error {
                RepositoryError::Conflict(_) => AuthError::UserExists,
                other => AuthError::persistence("user.sign_up")(other),
            })?;
        info!(user_id = %user.id, "user registered");

        let device_label = self.devices.resolve(device_descriptor);
        let issued = self.authorize(&user, &device_label).await?;
        Ok((user, issued))
    }

    /// `Ok(None)` means the request is anonymous.
    pub async fn resolve_current_user(&self, token: Option<&str>) -> AuthResult<Option<User>> {
        match token {
            Some(token) => self.resolve_token(token).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn sign_out(&self, session_id: &str) -> AuthResult<()> {
        self.revoke(session_id).await
    }

    pub async fn change_password(
        &self,
        user: &User,
        new_password: &str,
        keep_session: Option<&str>,
    ) -> AuthResult<()> {
        self.rotate_credential(user, new_password, keep_session)
            .await
            .map(|_| ())
    }

    async fn mark_revoked(
        &self,
        mut session: UserAuth,
        at: DateTime<Utc>,
        op: &'static str,
    ) -> AuthResult<()> {
        session.revoked_at = Some(at);
        self.sessions
            .update(&session)
            .await
            .map_err(AuthError::persistence(op))?;
        info!(session_id = %session.id, user_id = %session.user_id, "session revoked");
        Ok(())
    }
}

async fn supersede_and_create(sessions: &dyn AuthRepository, record: UserAuth) -> AuthResult<()> {
    let superseded = sessions
        .supersede(&record)
        .await
        .map_err(AuthError::persistence("session.authorize"))?;

    if let Some(previous) = superseded {
        debug!(session_id = %previous, "superseded device session");
    }
    Ok(())
}
