//! SQLite implementations of the authentication repositories.

pub mod auth_repository;
pub mod user_repository;

pub use auth_repository::SqliteAuthRepository;
pub use user_repository::SqliteUserRepository;

use chrono::{DateTime, SecondsFormat, Utc};
use quill_auth::RepositoryError;

/// Fixed-width UTC text so that stored timestamps compare lexically.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Backend(format!("invalid stored timestamp {value}: {e}")))
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(db_err.message().to_string());
        }
    }
    RepositoryError::Backend(err.to_string())
}
