use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::{CalendarShare, SHARE_ACCEPTED, SHARE_PENDING};
use crate::error::{AppError, AppResult};

// ============================================================================
// Calendar Share Repository
// ============================================================================

pub struct CalendarShareRepository;

impl CalendarShareRepository {
    /// Offer the owner's calendar to the grantee. An existing share is returned unchanged.
    pub async fn create(
        pool: &SqlitePool,
        owner_user_id: &str,
        grantee_user_id: &str,
    ) -> AppResult<CalendarShare> {
        if owner_user_id == grantee_user_id {
            return Err(AppError::BadRequest(
                "Cannot share a calendar with yourself".to_string(),
            ));
        }

        if let Some(existing) =
            Self::find_by_owner_and_grantee(pool, owner_user_id, grantee_user_id).await?
        {
            return Ok(existing);
        }

        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, CalendarShare>(
            r#"
            INSERT INTO calendar_shares (
                id, owner_user_id, grantee_user_id, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, owner_user_id, grantee_user_id, status, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(owner_user_id)
        .bind(grantee_user_id)
        .bind(SHARE_PENDING)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_owner_and_grantee(
        pool: &SqlitePool,
        owner_user_id: &str,
        grantee_user_id: &str,
    ) -> AppResult<Option<CalendarShare>> {
        sqlx::query_as::<_, CalendarShare>(
            r#"
            SELECT id, owner_user_id, grantee_user_id, status, created_at, updated_at
            FROM calendar_shares
            WHERE owner_user_id = ? AND grantee_user_id = ?
            LIMIT 1
            "#,
        )
        .bind(owner_user_id)
        .bind(grantee_user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Grantee accepts a pending share from the owner.
    pub async fn accept(
        pool: &SqlitePool,
        owner_user_id: &str,
        grantee_user_id: &str,
    ) -> AppResult<CalendarShare> {
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, CalendarShare>(
            r#"
            UPDATE calendar_shares
            SET status = ?, updated_at = ?
            WHERE owner_user_id = ? AND grantee_user_id = ?
            RETURNING id, owner_user_id, grantee_user_id, status, created_at, updated_at
            "#,
        )
        .bind(SHARE_ACCEPTED)
        .bind(now)
        .bind(owner_user_id)
        .bind(grantee_user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("Share not found".to_string()))
    }

    /// Delete a share (revoke access).
    pub async fn delete(
        pool: &SqlitePool,
        owner_user_id: &str,
        grantee_user_id: &str,
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM calendar_shares WHERE owner_user_id = ? AND grantee_user_id = ?")
            .bind(owner_user_id)
            .bind(grantee_user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Owners whose accepted share lets the grantee read their calendar, oldest share first.
    pub async fn list_accepted_owner_ids(
        pool: &SqlitePool,
        grantee_user_id: &str,
    ) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT owner_user_id
            FROM calendar_shares
            WHERE grantee_user_id = ? AND status = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(grantee_user_id)
        .bind(SHARE_ACCEPTED)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.iter().map(|r| r.get("owner_user_id")).collect())
    }

    /// Grantees who currently see `owner_user_id`'s calendar.
    pub async fn list_accepted_grantee_ids(
        pool: &SqlitePool,
        owner_user_id: &str,
    ) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT grantee_user_id
            FROM calendar_shares
            WHERE owner_user_id = ? AND status = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(owner_user_id)
        .bind(SHARE_ACCEPTED)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.iter().map(|r| r.get("grantee_user_id")).collect())
    }

    /// Shares an owner has handed out, with each grantee's display name.
    pub async fn list_with_grantee_info(
        pool: &SqlitePool,
        owner_user_id: &str,
    ) -> AppResult<Vec<(CalendarShare, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT
                s.id, s.owner_user_id, s.grantee_user_id, s.status,
                s.created_at, s.updated_at,
                u.display_name AS grantee_display_name
            FROM calendar_shares s
            JOIN users u ON u.id = s.grantee_user_id
            WHERE s.owner_user_id = ?
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(owner_user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let share = CalendarShare {
                    id: r.get("id"),
                    owner_user_id: r.get("owner_user_id"),
                    grantee_user_id: r.get("grantee_user_id"),
                    status: r.get("status"),
                    created_at: r.get("created_at"),
                    updated_at: r.get("updated_at"),
                };
                (share, r.get("grantee_display_name"))
            })
            .collect())
    }

    /// Shares offered to a grantee, with each owner's display name.
    pub async fn list_with_owner_info(
        pool: &SqlitePool,
        grantee_user_id: &str,
    ) -> AppResult<Vec<(CalendarShare, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT
                s.id, s.owner_user_id, s.grantee_user_id, s.status,
                s.created_at, s.updated_at,
                u.display_name AS owner_display_name
            FROM calendar_shares s
            JOIN users u ON u.id = s.owner_user_id
            WHERE s.grantee_user_id = ?
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(grantee_user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let share = CalendarShare {
                    id: r.get("id"),
                    owner_user_id: r.get("owner_user_id"),
                    grantee_user_id: r.get("grantee_user_id"),
                    status: r.get("status"),
                    created_at: r.get("created_at"),
                    updated_at: r.get("updated_at"),
                };
                (share, r.get("owner_display_name"))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::UserRepository;
    use crate::db::test_pool;

    #[tokio::test]
    async fn only_accepted_shares_grant_access() {
        let pool = test_pool().await;
        for (id, name) in [("viewer", "Viewer"), ("ana", "Ana"), ("ben", "Ben")] {
            UserRepository::upsert(&pool, id, name, None).await.unwrap();
        }

        CalendarShareRepository::create(&pool, "ana", "viewer").await.unwrap();
        CalendarShareRepository::create(&pool, "ben", "viewer").await.unwrap();
        assert!(CalendarShareRepository::list_accepted_owner_ids(&pool, "viewer")
            .await
            .unwrap()
            .is_empty());

        let accepted = CalendarShareRepository::accept(&pool, "ben", "viewer").await.unwrap();
        assert_eq!(accepted.status, SHARE_ACCEPTED);
        assert_eq!(
            CalendarShareRepository::list_accepted_owner_ids(&pool, "viewer")
                .await
                .unwrap(),
            vec!["ben".to_string()]
        );
        assert_eq!(
            CalendarShareRepository::list_accepted_grantee_ids(&pool, "ben")
                .await
                .unwrap(),
            vec!["viewer".to_string()]
        );
        assert!(CalendarShareRepository::list_accepted_grantee_ids(&pool, "ana")
            .await
            .unwrap()
            .is_empty());

        let incoming = CalendarShareRepository::list_with_owner_info(&pool, "viewer")
            .await
            .unwrap();
        assert_eq!(incoming.len(), 2);

        tokio_test::assert_ok!(CalendarShareRepository::delete(&pool, "ben", "viewer").await);
        assert!(CalendarShareRepository::list_accepted_owner_ids(&pool, "viewer")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn create_is_idempotent_and_rejects_self_share() {
        let pool = test_pool().await;
        UserRepository::upsert(&pool, "ana", "Ana", None).await.unwrap();
        UserRepository::upsert(&pool, "viewer", "Viewer", None).await.unwrap();

        let first = CalendarShareRepository::create(&pool, "ana", "viewer").await.unwrap();
        let second = CalendarShareRepository::create(&pool, "ana", "viewer").await.unwrap();
        assert_eq!(first.id, second.id);

        let own = CalendarShareRepository::create(&pool, "ana", "ana").await;
        assert!(matches!(own, Err(AppError::BadRequest(_))));

        let granted = CalendarShareRepository::list_with_grantee_info(&pool, "ana")
            .await
            .unwrap();
        assert_eq!(granted[0].1, "Viewer");
    }

    #[tokio::test]
    async fn accepting_missing_share_is_not_found() {
        let pool = test_pool().await;
        let result = CalendarShareRepository::accept(&pool, "nobody", "viewer").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
