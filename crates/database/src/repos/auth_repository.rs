//! Session repository backed by the `user_auth` table.
//!
//! The partial unique index on `(user_id, device_label) WHERE revoked_at IS NULL`
//! turns a second live session for a device into a [`RepositoryError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_auth::{AuthRepository, RepositoryError, RepositoryResult, UserAuth};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::{decode_timestamp, encode_timestamp, map_sqlx_error};

const SESSION_COLUMNS: &str = "id, user_id, device_label, issued_at, expires_at, revoked_at";

#[derive(Clone)]
pub struct SqliteAuthRepository {
    pool: SqlitePool,
}

impl SqliteAuthRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete rows that expired or were revoked before `before`. Returns the number removed.
    pub async fn purge_expired(&self, before: DateTime<Utc>) -> RepositoryResult<u64> {
        let cutoff = encode_timestamp(before);
        let result = sqlx::query(
            "DELETE FROM user_auth
             WHERE expires_at < ? OR (revoked_at IS NOT NULL AND revoked_at < ?)",
        )
        .bind(&cutoff)
        .bind(&cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        info!(removed = result.rows_affected(), "purged stale sessions");
        Ok(result.rows_affected())
    }
}

fn session_from_row(row: &SqliteRow) -> RepositoryResult<UserAuth> {
    let revoked_at: Option<String> = row.try_get("revoked_at").map_err(map_sqlx_error)?;
    let issued_at: String = row.try_get("issued_at").map_err(map_sqlx_error)?;
    let expires_at: String = row.try_get("expires_at").map_err(map_sqlx_error)?;

    Ok(UserAuth {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        user_id: row.try_get("user_id").map_err(map_sqlx_error)?,
        device_label: row.try_get("device_label").map_err(map_sqlx_error)?,
        issued_at: decode_timestamp(&issued_at)?,
        expires_at: decode_timestamp(&expires_at)?,
        revoked_at: revoked_at.as_deref().map(decode_timestamp).transpose()?,
    })
}

#[async_trait]
impl AuthRepository for SqliteAuthRepository {
    async fn create(&self, session: &UserAuth) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO user_auth (id, user_id, device_label, issued_at, expires_at, revoked_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.device_label)
        .bind(encode_timestamp(session.issued_at))
        .bind(encode_timestamp(session.expires_at))
        .bind(session.revoked_at.map(encode_timestamp))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_by_id(&self, session_id: &str) -> RepositoryResult<Option<UserAuth>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM user_auth WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn update(&self, session: &UserAuth) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE user_auth SET revoked_at = ? WHERE id = ?")
            .bind(session.revoked_at.map(encode_timestamp))
            .bind(&session.id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!(
                "session {} does not exist",
                session.id
            )));
        }
        Ok(())
    }

    async fn delete_item(&self, session_id: &str) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM user_auth WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn supersede(&self, session: &UserAuth) -> RepositoryResult<Option<String>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT id FROM user_auth
             WHERE user_id = ? AND device_label = ? AND revoked_at IS NULL",
        )
        .bind(&session.user_id)
        .bind(&session.device_label)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(previous_id) = &previous {
            sqlx::query("UPDATE user_auth SET revoked_at = ? WHERE id = ?")
                .bind(encode_timestamp(session.issued_at))
                .bind(previous_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        sqlx::query(
            "INSERT INTO user_auth (id, user_id, device_label, issued_at, expires_at, revoked_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.device_label)
        .bind(encode_timestamp(session.issued_at))
        .bind(encode_timestamp(session.expires_at))
        .bind(session.revoked_at.map(encode_timestamp))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(previous)
    }

    async fn find_current(
        &self,
        user_id: &str,
        device_label: &str,
    ) -> RepositoryResult<Option<UserAuth>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM user_auth
             WHERE user_id = ? AND device_label = ? AND revoked_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(device_label)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> RepositoryResult<Vec<UserAuth>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM user_auth
             WHERE user_id = ? ORDER BY issued_at DESC, rowid DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(session_from_row).collect()
    }
}
