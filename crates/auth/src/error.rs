use thiserror::Error;

/// Failure reported by a repository collaborator.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("user already exists")]
    UserExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user not found")]
    NotFound,
    #[error("invalid session token")]
    TokenInvalid,
    #[error("session token expired")]
    TokenExpired,
    #[error("session revoked")]
    SessionRevoked,
    #[error("credential rejected: {0}")]
    Credential(String),
    #[error("{op} failed: {source}")]
    Persistence {
        op: &'static str,
        #[source]
        source: RepositoryError,
    },
    /// A local primitive (hasher, signer) failed; never the caller's fault.
    #[error("{op} failed: {detail}")]
    Internal { op: &'static str, detail: String },
}

pub type AuthResult<T> = Result<T, AuthError>;

const INVALID_LOGIN_MESSAGE: &str = "invalid email or password";

impl AuthError {
    pub(crate) fn persistence(op: &'static str) -> impl FnOnce(RepositoryError) -> AuthError {
        move |source| AuthError::Persistence { op, source }
    }

    pub(crate) fn internal<E: std::fmt::Display>(op: &'static str) -> impl FnOnce(E) -> AuthError {
        move |error| AuthError::Internal {
            op,
            detail: error.to_string(),
        }
    }

    /// Stable machine-readable code. Unknown-account and wrong-password share one code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::UserExists => "user_exists",
            AuthError::InvalidCredentials | AuthError::NotFound => "invalid_credentials",
            AuthError::TokenInvalid => "token_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::SessionRevoked => "session_revoked",
            AuthError::Credential(_) => "credential_error",
            AuthError::Persistence { .. } | AuthError::Internal { .. } => "internal_error",
        }
    }

    /// Message safe to show to the end user; never includes collaborator detail.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Validation(reason) => reason.clone(),
            AuthError::UserExists => "an account with this email already exists".to_string(),
            AuthError::InvalidCredentials | AuthError::NotFound => {
                INVALID_LOGIN_MESSAGE.to_string()
            }
            AuthError::TokenInvalid => "session token is invalid".to_string(),
            AuthError::TokenExpired => "session has expired".to_string(),
            AuthError::SessionRevoked => "session is no longer valid".to_string(),
            AuthError::Credential(reason) => reason.clone(),
            AuthError::Persistence { .. } | AuthError::Internal { .. } => {
                "internal server error".to_string()
            }
        }
    }
}
