//! User repository backed by the `users` and `user_settings` tables.

use async_trait::async_trait;
use quill_auth::{RepositoryError, RepositoryResult, User, UserRepository, UserRole, UserSettings};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{decode_timestamp, encode_timestamp, map_sqlx_error};

const USER_SELECT: &str = "
    SELECT u.id, u.email, u.name, u.encrypted_password, u.salt, u.role,
           u.description, u.avatar_url, u.cover_url, u.created_at, u.updated_at,
           COALESCE(s.news_line_default, 'popular') AS news_line_default,
           COALESCE(s.news_line_sort, 'new') AS news_line_sort,
           (SELECT COUNT(*) FROM user_subscription WHERE owner_id = u.id) AS subscriptions_count,
           (SELECT COUNT(*) FROM user_subscription WHERE subscribed_user_id = u.id) AS subscribers_count
    FROM users u
    LEFT JOIN user_settings s ON s.user_id = u.id";

#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> RepositoryResult<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE {clause}");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(user_from_row).transpose()
    }
}

fn user_from_row(row: &SqliteRow) -> RepositoryResult<User> {
    let get_str = |column: &str| -> RepositoryResult<String> {
        row.try_get::<String, _>(column).map_err(map_sqlx_error)
    };
    let get_opt = |column: &str| -> RepositoryResult<Option<String>> {
        row.try_get::<Option<String>, _>(column).map_err(map_sqlx_error)
    };
    let get_count = |column: &str| -> RepositoryResult<i64> {
        row.try_get::<i64, _>(column).map_err(map_sqlx_error)
    };

    Ok(User {
        id: get_str("id")?,
        email: get_str("email")?,
        name: get_str("name")?,
        encrypted_password: get_str("encrypted_password")?,
        salt: get_str("salt")?,
        role: UserRole::from(get_str("role")?.as_str()),
        description: get_opt("description")?,
        avatar_url: get_opt("avatar_url")?,
        cover_url: get_opt("cover_url")?,
        settings: UserSettings {
            news_line_default: get_str("news_line_default")?,
            news_line_sort: get_str("news_line_sort")?,
        },
        subscriptions_count: get_count("subscriptions_count")?,
        subscribers_count: get_count("subscribers_count")?,
        created_at: decode_timestamp(&get_str("created_at")?)?,
        updated_at: decode_timestamp(&get_str("updated_at")?)?,
    })
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.fetch_one_where("u.email = ?", email).await
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        self.fetch_one_where("u.id = ?", id).await
    }

    async fn find_by_auth_id(&self, session_id: &str) -> RepositoryResult<Option<User>> {
        self.fetch_one_where("u.id = (SELECT user_id FROM user_auth WHERE id = ?)", session_id)
            .await
    }

    async fn create_personal(&self, user: &User) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO users (id, encrypted_password, salt, created_at, updated_at, role,
                                email, name, description, avatar_url, cover_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.encrypted_password)
        .bind(&user.salt)
        .bind(encode_timestamp(user.created_at))
        .bind(encode_timestamp(user.updated_at))
        .bind(UserRole::Personal.as_str())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.description)
        .bind(&user.avatar_url)
        .bind(&user.cover_url)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO user_settings (user_id, news_line_default, news_line_sort)
             VALUES (?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.settings.news_line_default)
        .bind(&user.settings.news_line_sort)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(user_id = %user.id, "personal account stored");
        Ok(())
    }

    async fn update_credentials(
        &self,
        user_id: &str,
        encrypted_password: &str,
        salt: &str,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET encrypted_password = ?, salt = ?, updated_at = ? WHERE id = ?",
        )
        .bind(encrypted_password)
        .bind(salt)
        .bind(encode_timestamp(chrono::Utc::now()))
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!("user {user_id} does not exist")));
        }
        Ok(())
    }
}
