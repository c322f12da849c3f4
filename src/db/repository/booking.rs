use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Booking, BookingStatus, RawBookingRow};
use crate::error::{AppError, AppResult};

// ============================================================================
// Booking Repository
// ============================================================================

pub struct BookingRepository;

impl BookingRepository {
    /// Book a user onto an activity. Re-booking after a cancellation reuses the row.
    pub async fn create(
        pool: &SqlitePool,
        activity_id: &str,
        user_id: &str,
        status: BookingStatus,
        guest_count: i64,
    ) -> AppResult<Booking> {
        if guest_count < 1 {
            return Err(AppError::Validation(
                "guest_count must be at least 1".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (id, activity_id, user_id, status, guest_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(activity_id, user_id) DO UPDATE SET
                status = excluded.status,
                guest_count = excluded.guest_count,
                updated_at = excluded.updated_at
            RETURNING id, activity_id, user_id, status, guest_count, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(activity_id)
        .bind(user_id)
        .bind(status.as_str())
        .bind(guest_count)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, activity_id, user_id, status, guest_count, created_at, updated_at
            FROM bookings
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: &str,
        status: BookingStatus,
    ) -> AppResult<Booking> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, activity_id, user_id, status, guest_count, created_at, updated_at
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))
    }

    /// Pending and confirmed bookings of a user, joined with the raw activity schedule.
    pub async fn fetch_active_for_user(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Vec<RawBookingRow>> {
        sqlx::query_as::<_, RawBookingRow>(
            r#"
            SELECT
                b.id AS booking_id,
                b.activity_id AS activity_id,
                b.status AS status,
                b.guest_count AS guest_count,
                a.title AS title,
                a.location AS location,
                a.schedule_json AS schedule_json
            FROM bookings b
            JOIN activities a ON a.id = b.activity_id
            WHERE b.user_id = ? AND b.status IN ('pending', 'confirmed')
            ORDER BY b.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Users holding a pending or confirmed booking on the activity.
    pub async fn list_active_user_ids(
        pool: &SqlitePool,
        activity_id: &str,
    ) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_id
            FROM bookings
            WHERE activity_id = ? AND status IN ('pending', 'confirmed')
            ORDER BY created_at ASC
            "#,
        )
        .bind(activity_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::CreateActivity;
    use crate::db::repository::{ActivityRepository, UserRepository};
    use crate::db::test_pool;
    use crate::schedule::{ActivityKind, ScheduleModel};

    #[tokio::test]
    async fn only_pending_and_confirmed_are_active() {
        let pool = test_pool().await;
        UserRepository::upsert(&pool, "owner", "Owner", None).await.unwrap();
        UserRepository::upsert(&pool, "kid", "Kid", None).await.unwrap();

        let mut ids = Vec::new();
        for title in ["Pottery", "Chess", "Swim"] {
            let activity = ActivityRepository::create(
                &pool,
                "owner",
                &CreateActivity {
                    title: title.to_string(),
                    location: None,
                    activity_kind: "class".to_string(),
                    schedule_json: ScheduleModel::new_for(ActivityKind::Class)
                        .to_json()
                        .unwrap(),
                },
            )
            .await
            .unwrap();
            ids.push(activity.id);
        }

        BookingRepository::create(&pool, &ids[0], "kid", BookingStatus::Confirmed, 2)
            .await
            .unwrap();
        BookingRepository::create(&pool, &ids[1], "kid", BookingStatus::Pending, 1)
            .await
            .unwrap();
        let waitlisted = BookingRepository::create(&pool, &ids[2], "kid", BookingStatus::Pending, 1)
            .await
            .unwrap();
        BookingRepository::update_status(&pool, &waitlisted.id, BookingStatus::Waitlisted)
            .await
            .unwrap();

        let rows = BookingRepository::fetch_active_for_user(&pool, "kid").await.unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Pottery", "Chess"]);
        assert_eq!(rows[0].guest_count, 2);

        let bookers = BookingRepository::list_active_user_ids(&pool, &ids[1]).await.unwrap();
        assert_eq!(bookers, vec!["kid".to_string()]);
        assert!(BookingRepository::list_active_user_ids(&pool, &ids[2])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn zero_guests_is_rejected() {
        let pool = test_pool().await;
        let result = BookingRepository::create(&pool, "a", "u", BookingStatus::Pending, 0).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn cancelling_unknown_booking_is_not_found() {
        let pool = test_pool().await;
        let result =
            BookingRepository::update_status(&pool, "missing", BookingStatus::Cancelled).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
