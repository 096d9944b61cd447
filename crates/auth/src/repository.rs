//! Persistence contracts consumed by the session manager.
//!
//! Implementations enforce at most one non-revoked session per
//! `(user_id, device_label)` and report a violating insert as
//! [`RepositoryError::Conflict`]. Timeouts belong to the implementation; the
//! manager never retries.

use async_trait::async_trait;

use crate::entities::{User, UserAuth};
use crate::error::RepositoryError;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;

    /// Owner of the given session id.
    async fn find_by_auth_id(&self, session_id: &str) -> RepositoryResult<Option<User>>;

    /// Insert a personal account and its default settings atomically.
    async fn create_personal(&self, user: &User) -> RepositoryResult<()>;

    async fn update_credentials(
        &self,
        user_id: &str,
        encrypted_password: &str,
        salt: &str,
    ) -> RepositoryResult<()>;
}

#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn create(&self, session: &UserAuth) -> RepositoryResult<()>;

    async fn get_by_id(&self, session_id: &str) -> RepositoryResult<Option<UserAuth>>;

    /// Persist a mutated session; only `revoked_at` is expected to change.
    async fn update(&self, session: &UserAuth) -> RepositoryResult<()>;

    async fn delete_item(&self, session_id: &str) -> RepositoryResult<()>;

    /// Revoke the device's non-revoked session at `session.issued_at` and insert
    /// `session`, as one unit: on failure neither write is visible. Returns the
    /// id of the revoked session, if there was one.
    async fn supersede(&self, session: &UserAuth) -> RepositoryResult<Option<String>>;

    /// The non-revoked session for a device, expired or not.
    async fn find_current(
        &self,
        user_id: &str,
        device_label: &str,
    ) -> RepositoryResult<Option<UserAuth>>;

    /// Every session of a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> RepositoryResult<Vec<UserAuth>>;
}
