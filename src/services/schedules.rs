use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::db::models::Activity;
use crate::db::ActivityRepository;
use crate::error::{AppError, AppErrorWithDetails, AppResult};
use crate::schedule::ScheduleModel;
use crate::services::editor::{validate_for_submit, BuilderOp, ScheduleEditor};

/// Unsaved schedule edits, plus the stored version they were based on.
#[derive(Debug, Clone)]
struct Draft {
    model: ScheduleModel,
    base_version: i64,
}

/// Drafts keyed by (editor, activity).
#[derive(Default)]
pub struct ScheduleDrafts {
    drafts: RwLock<HashMap<(String, String), Draft>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleState {
    pub activity_id: String,
    pub model: ScheduleModel,
    /// Stored version the model was read at or based on.
    pub version: i64,
    pub has_draft: bool,
}

fn key(editor_id: &str, activity_id: &str) -> (String, String) {
    (editor_id.to_string(), activity_id.to_string())
}

fn conflict_with_draft(error: AppError, activity_id: &str, draft: &Draft) -> AppErrorWithDetails {
    error.with_details(json!({
        "activityId": activity_id,
        "draft": draft.model,
        "baseVersion": draft.base_version,
    }))
}

async fn owned_activity(pool: &SqlitePool, editor_id: &str, activity_id: &str) -> AppResult<Activity> {
    let activity = ActivityRepository::find_by_id(pool, activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;

    if activity.owner_user_id != editor_id {
        warn!(
            "User {} tried to edit schedule of activity {} owned by {}",
            editor_id, activity_id, activity.owner_user_id
        );
        return Err(AppError::Forbidden);
    }

    Ok(activity)
}

impl ScheduleDrafts {
    pub fn new() -> Self {
        Self::default()
    }

    async fn stored(pool: &SqlitePool, activity_id: &str) -> AppResult<Draft> {
        let (model, version) = ActivityRepository::load_schedule(pool, activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;
        Ok(Draft {
            model,
            base_version: version,
        })
    }

    /// The editor's draft if one exists, otherwise the stored model.
    pub async fn current(
        &self,
        pool: &SqlitePool,
        editor_id: &str,
        activity_id: &str,
    ) -> AppResult<ScheduleState> {
        owned_activity(pool, editor_id, activity_id).await?;

        if let Some(draft) = self.drafts.read().await.get(&key(editor_id, activity_id)) {
            return Ok(ScheduleState {
                activity_id: activity_id.to_string(),
                model: draft.model.clone(),
                version: draft.base_version,
                has_draft: true,
            });
        }

        let stored = Self::stored(pool, activity_id).await?;
        Ok(ScheduleState {
            activity_id: activity_id.to_string(),
            model: stored.model,
            version: stored.base_version,
            has_draft: false,
        })
    }

    /// Apply one builder operation to the draft and persist the result.
    /// A rejected operation changes nothing; a persistence conflict keeps the
    /// edited draft and returns it in the error details.
    pub async fn save_edit(
        &self,
        pool: &SqlitePool,
        editor_id: &str,
        activity_id: &str,
        op: BuilderOp,
    ) -> Result<ScheduleState, AppErrorWithDetails> {
        owned_activity(pool, editor_id, activity_id).await?;

        let draft_key = key(editor_id, activity_id);
        let existing = self.drafts.read().await.get(&draft_key).cloned();
        let base = match existing {
            Some(draft) => draft,
            None => Self::stored(pool, activity_id).await?,
        };

        let mut editor = ScheduleEditor::new(base.model);
        editor.apply(op).map_err(AppError::from)?;
        let draft = Draft {
            model: editor.into_model(),
            base_version: base.base_version,
        };

        self.persist(pool, draft_key, activity_id, draft).await
    }

    /// Validate the whole model and persist it against `expected_version`.
    pub async fn submit(
        &self,
        pool: &SqlitePool,
        editor_id: &str,
        activity_id: &str,
        model: Option<ScheduleModel>,
        expected_version: i64,
    ) -> Result<ScheduleState, AppErrorWithDetails> {
        owned_activity(pool, editor_id, activity_id).await?;

        let draft_key = key(editor_id, activity_id);
        let model = match model {
            Some(model) => model,
            None => {
                let existing = self.drafts.read().await.get(&draft_key).cloned();
                match existing {
                    Some(draft) => draft.model,
                    None => Self::stored(pool, activity_id).await?.model,
                }
            }
        };

        if let Err(problems) = validate_for_submit(&model) {
            debug!(
                "Rejected schedule submit for activity {}: {:?}",
                activity_id, problems
            );
            return Err(AppError::Validation(problems.join("; "))
                .with_details(json!({ "problems": problems })));
        }

        let draft = Draft {
            model,
            base_version: expected_version,
        };
        self.persist(pool, draft_key, activity_id, draft).await
    }

    async fn persist(
        &self,
        pool: &SqlitePool,
        draft_key: (String, String),
        activity_id: &str,
        draft: Draft,
    ) -> Result<ScheduleState, AppErrorWithDetails> {
        match ActivityRepository::save_schedule(pool, activity_id, &draft.model, draft.base_version)
            .await
        {
            Ok(version) => {
                self.drafts.write().await.remove(&draft_key);
                info!("Saved schedule of activity {} at version {}", activity_id, version);
                Ok(ScheduleState {
                    activity_id: activity_id.to_string(),
                    model: draft.model,
                    version,
                    has_draft: false,
                })
            }
            Err(e @ AppError::Conflict(_)) => {
                warn!(
                    "Schedule of activity {} changed underneath the editor; keeping draft",
                    activity_id
                );
                let response = conflict_with_draft(e, activity_id, &draft);
                self.drafts.write().await.insert(draft_key, draft);
                Err(response)
            }
            Err(e) => {
                self.drafts.write().await.insert(draft_key, draft);
                Err(e.into())
            }
        }
    }

    /// Drop the draft and return the stored model.
    pub async fn discard(
        &self,
        pool: &SqlitePool,
        editor_id: &str,
        activity_id: &str,
    ) -> AppResult<ScheduleState> {
        owned_activity(pool, editor_id, activity_id).await?;
        if self
            .drafts
            .write()
            .await
            .remove(&key(editor_id, activity_id))
            .is_some()
        {
            debug!("Discarded schedule draft for activity {}", activity_id);
        }
        self.current(pool, editor_id, activity_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::CreateActivity;
    use crate::db::test_pool;
    use crate::db::UserRepository;
    use crate::schedule::{ActivityKind, FixedSchedule, ScheduleKind};

    async fn setup() -> (SqlitePool, String) {
        let pool = test_pool().await;
        UserRepository::upsert(&pool, "owner", "Owner", None).await.unwrap();
        UserRepository::upsert(&pool, "other", "Other", None).await.unwrap();
        let activity = ActivityRepository::create(
            &pool,
            "owner",
            &CreateActivity {
                title: "Robotics camp".to_string(),
                location: None,
                activity_kind: "camp".to_string(),
                schedule_json: ScheduleModel::new_for(ActivityKind::Camp).to_json().unwrap(),
            },
        )
        .await
        .unwrap();
        (pool, activity.id)
    }

    fn valid_fixed() -> ScheduleModel {
        ScheduleModel {
            schedule: ScheduleKind::Fixed(FixedSchedule {
                start_date: "2025-07-14".to_string(),
                start_time: Some("09:00".to_string()),
                end_time: Some("15:00".to_string()),
                ..Default::default()
            }),
            ..ScheduleModel::new_for(ActivityKind::Camp)
        }
    }

    fn switch_to_sessions() -> BuilderOp {
        BuilderOp::SwitchScheduleType {
            schedule_type: "campSessions".to_string(),
        }
    }

    #[tokio::test]
    async fn edit_is_applied_and_persisted() {
        let (pool, id) = setup().await;
        let drafts = ScheduleDrafts::new();

        let state = drafts
            .save_edit(&pool, "owner", &id, switch_to_sessions())
            .await
            .unwrap();
        assert_eq!(state.version, 2);
        assert!(!state.has_draft);

        let (stored, _) = ActivityRepository::load_schedule(&pool, &id).await.unwrap().unwrap();
        assert!(matches!(stored.schedule, ScheduleKind::CampSessions(_)));
    }

    #[tokio::test]
    async fn invalid_edit_changes_nothing() {
        let (pool, id) = setup().await;
        let drafts = ScheduleDrafts::new();

        let err = drafts
            .save_edit(&pool, "owner", &id, BuilderOp::AddSection)
            .await
            .unwrap_err();
        assert!(matches!(err.error(), AppError::InvalidEdit(_)));

        let current = drafts.current(&pool, "owner", &id).await.unwrap();
        assert!(!current.has_draft);
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn conflict_keeps_the_draft_until_discarded() {
        let (pool, id) = setup().await;
        let drafts = ScheduleDrafts::new();

        // Someone else saves first.
        ActivityRepository::save_schedule(&pool, &id, &valid_fixed(), 1)
            .await
            .unwrap();

        let err = drafts
            .submit(&pool, "owner", &id, Some(valid_fixed()), 1)
            .await
            .unwrap_err();
        assert!(matches!(err.error(), AppError::Conflict(_)));

        let current = drafts.current(&pool, "owner", &id).await.unwrap();
        assert!(current.has_draft);
        assert_eq!(current.version, 1);

        let reloaded = drafts.discard(&pool, "owner", &id).await.unwrap();
        assert!(!reloaded.has_draft);
        assert_eq!(reloaded.version, 2);

        let resubmitted = drafts.submit(&pool, "owner", &id, None, 2).await.unwrap();
        assert_eq!(resubmitted.version, 3);
    }

    #[tokio::test]
    async fn submit_rejects_invalid_models() {
        let (pool, id) = setup().await;
        let drafts = ScheduleDrafts::new();

        let err = drafts.submit(&pool, "owner", &id, None, 1).await.unwrap_err();
        assert!(matches!(err.error(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn only_the_owner_may_edit() {
        let (pool, id) = setup().await;
        let drafts = ScheduleDrafts::new();

        let err = drafts
            .save_edit(&pool, "other", &id, switch_to_sessions())
            .await
            .unwrap_err();
        assert!(matches!(err.error(), AppError::Forbidden));
    }
}
