use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Activity, CreateActivity};
use crate::error::{AppError, AppResult};
use crate::schedule::ScheduleModel;

// ============================================================================
// Activity Repository
// ============================================================================

pub struct ActivityRepository;

impl ActivityRepository {
    pub async fn create(
        pool: &SqlitePool,
        owner_user_id: &str,
        input: &CreateActivity,
    ) -> AppResult<Activity> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO activities (
                id, owner_user_id, title, location, activity_kind, schedule_json,
                version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING id, owner_user_id, title, location, activity_kind, schedule_json,
                      version, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(owner_user_id)
        .bind(&input.title)
        .bind(&input.location)
        .bind(&input.activity_kind)
        .bind(&input.schedule_json)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Activity>> {
        sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, owner_user_id, title, location, activity_kind, schedule_json,
                   version, created_at, updated_at
            FROM activities
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Decode the stored schedule together with the version it was read at.
    pub async fn load_schedule(
        pool: &SqlitePool,
        id: &str,
    ) -> AppResult<Option<(ScheduleModel, i64)>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT schedule_json, version FROM activities WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(AppError::Database)?;

        match row {
            Some((json, version)) => Ok(Some((ScheduleModel::from_json(&json)?, version))),
            None => Ok(None),
        }
    }

    /// Write a schedule only if the stored version still equals `expected_version`.
    /// Returns the new version.
    pub async fn save_schedule(
        pool: &SqlitePool,
        id: &str,
        model: &ScheduleModel,
        expected_version: i64,
    ) -> AppResult<i64> {
        let json = model.to_json()?;
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE activities
            SET schedule_json = ?, activity_kind = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(&json)
        .bind(model.activity_kind.as_str())
        .bind(now)
        .bind(id)
        .bind(expected_version)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return match Self::find_by_id(pool, id).await? {
                Some(current) => Err(AppError::Conflict(format!(
                    "Schedule was changed elsewhere (expected version {}, stored {})",
                    expected_version, current.version
                ))),
                None => Err(AppError::NotFound(format!("Activity {} not found", id))),
            };
        }

        Ok(expected_version + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::UserRepository;
    use crate::db::test_pool;
    use crate::schedule::{ActivityKind, AgeBucket, ScheduleKind, Session};

    async fn seeded(pool: &SqlitePool) -> Activity {
        UserRepository::upsert(pool, "owner", "Owner", None).await.unwrap();
        let model = ScheduleModel::new_for(ActivityKind::Camp);
        ActivityRepository::create(
            pool,
            "owner",
            &CreateActivity {
                title: "Sailing camp".to_string(),
                location: Some("Harbor".to_string()),
                activity_kind: "camp".to_string(),
                schedule_json: model.to_json().unwrap(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn schedule_round_trips_through_the_store() {
        let pool = test_pool().await;
        let activity = seeded(&pool).await;

        let mut session = Session::blank();
        session.start_date = "2025-07-07".to_string();
        session.end_date = "2025-07-11".to_string();
        session.start_time = "09:00".to_string();
        session.capacity = 12;
        let mut model = ScheduleModel::new_for(ActivityKind::Camp);
        model.schedule = ScheduleKind::CampSessions(crate::schedule::CampSessionsSchedule {
            sessions: vec![session],
        });
        model.age_range.select(AgeBucket::SixToEight);

        let version = ActivityRepository::save_schedule(&pool, &activity.id, &model, 1)
            .await
            .unwrap();
        assert_eq!(version, 2);

        let (loaded, loaded_version) = ActivityRepository::load_schedule(&pool, &activity.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, model);
        assert_eq!(loaded_version, 2);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let pool = test_pool().await;
        let activity = seeded(&pool).await;
        let model = ScheduleModel::new_for(ActivityKind::Camp);

        ActivityRepository::save_schedule(&pool, &activity.id, &model, 1)
            .await
            .unwrap();
        let stale = ActivityRepository::save_schedule(&pool, &activity.id, &model, 1).await;
        assert!(matches!(stale, Err(AppError::Conflict(_))));

        let missing = ActivityRepository::save_schedule(&pool, "nope", &model, 1).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
