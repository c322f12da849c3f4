use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::User;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, display_name, email, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Insert the user if unknown, otherwise refresh the display name.
    /// Identity comes from the bearer token, so the id is never generated here.
    pub async fn upsert(
        pool: &SqlitePool,
        id: &str,
        display_name: &str,
        email: Option<&str>,
    ) -> AppResult<User> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, display_name, email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                email = COALESCE(excluded.email, users.email),
                updated_at = excluded.updated_at
            RETURNING id, display_name, email, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(email)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn display_name(pool: &SqlitePool, id: &str) -> AppResult<Option<String>> {
        let name: Option<(String,)> =
            sqlx::query_as("SELECT display_name FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(AppError::Database)?;

        Ok(name.map(|(n,)| n))
    }
}
