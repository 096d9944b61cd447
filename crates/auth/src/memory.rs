//! In-process repositories used by tests and local tooling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::entities::{User, UserAuth};
use crate::error::RepositoryError;
use crate::repository::{AuthRepository, RepositoryResult, UserRepository};

/// Session store with the same uniqueness rule as the SQL schema.
#[derive(Clone, Default)]
pub struct MemoryAuthRepository {
    sessions: Arc<RwLock<HashMap<String, UserAuth>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn check_writable(&self) -> RepositoryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Backend("memory store is read-only".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AuthRepository for MemoryAuthRepository {
    async fn create(&self, session: &UserAuth) -> RepositoryResult<()> {
        self.check_writable()?;
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&session.id) {
            return Err(RepositoryError::Conflict(format!(
                "session {} already exists",
                session.id
            )));
        }
        let duplicate = !session.is_revoked()
            && sessions.values().any(|existing| {
                !existing.is_revoked()
                    && existing.user_id == session.user_id
                    && existing.device_label == session.device_label
            });
        if duplicate {
            return Err(RepositoryError::Conflict(
                "an active session already exists for this device".to_string(),
            ));
        }

        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_by_id(&self, session_id: &str) -> RepositoryResult<Option<UserAuth>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn update(&self, session: &UserAuth) -> RepositoryResult<()> {
        self.check_writable()?;
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(RepositoryError::Backend(format!(
                "session {} does not exist",
                session.id
            ))),
        }
    }

    async fn delete_item(&self, session_id: &str) -> RepositoryResult<()> {
        self.check_writable()?;
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn supersede(&self, session: &UserAuth) -> RepositoryResult<Option<String>> {
        self.check_writable()?;
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&session.id) {
            return Err(RepositoryError::Conflict(format!(
                "session {} already exists",
                session.id
            )));
        }

        let previous = sessions
            .values_mut()
            .find(|existing| {
                !existing.is_revoked()
                    && existing.user_id == session.user_id
                    && existing.device_label == session.device_label
            })
            .map(|existing| {
                existing.revoked_at = Some(session.issued_at);
                existing.id.clone()
            });

        sessions.insert(session.id.clone(), session.clone());
        Ok(previous)
    }

    async fn find_current(
        &self,
        user_id: &str,
        device_label: &str,
    ) -> RepositoryResult<Option<UserAuth>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .find(|session| {
                !session.is_revoked()
                    && session.user_id == user_id
                    && session.device_label == device_label
            })
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> RepositoryResult<Vec<UserAuth>> {
        let sessions = self.sessions.read().await;
        let mut owned: Vec<UserAuth> = sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(owned)
    }
}

#[derive(Clone)]
pub struct MemoryUserRepository {
    users: Arc<RwLock<HashMap<String, User>>>,
    email_index: Arc<RwLock<HashMap<String, String>>>,
    sessions: MemoryAuthRepository,
}

impl MemoryUserRepository {
    /// `sessions` backs [`UserRepository::find_by_auth_id`].
    pub fn new(sessions: MemoryAuthRepository) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            email_index: Arc::new(RwLock::new(HashMap::new())),
            sessions,
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let email_index = self.email_index.read().await;
        let Some(user_id) = email_index.get(email) else {
            return Ok(None);
        };
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_auth_id(&self, session_id: &str) -> RepositoryResult<Option<User>> {
        match self.sessions.get_by_id(session_id).await? {
            Some(session) => self.find_by_id(&session.user_id).await,
            None => Ok(None),
        }
    }

    async fn create_personal(&self, user: &User) -> RepositoryResult<()> {
        let mut email_index = self.email_index.write().await;
        if email_index.contains_key(&user.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }

        email_index.insert(user.email.clone(), user.id.clone());
        self.users.write().await.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_credentials(
        &self,
        user_id: &str,
        encrypted_password: &str,
        salt: &str,
    ) -> RepositoryResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| RepositoryError::Backend(format!("user {user_id} does not exist")))?;
        user.encrypted_password = encrypted_password.to_string();
        user.salt = salt.to_string();
        user.updated_at = chrono::Utc::now();
        Ok(())
    }
}
