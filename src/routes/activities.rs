use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::models::{Activity, Booking, BookingStatus, CreateActivity};
use crate::db::{ActivityRepository, BookingRepository};
use crate::error::{AppError, AppErrorWithDetails, AppResult};
use crate::routes::auth::AuthUser;
use crate::schedule::{ActivityKind, ScheduleModel};
use crate::services::editor::BuilderOp;
use crate::services::schedules::ScheduleState;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_activity))
        .route("/:id", get(get_activity))
        .route("/:id/schedule", get(get_schedule).put(submit_schedule))
        .route("/:id/schedule/edits", post(save_schedule_edit))
        .route("/:id/schedule/draft", delete(discard_draft))
        .route("/:id/bookings", post(create_booking))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    pub title: String,
    pub location: Option<String>,
    pub activity_kind: ActivityKind,
    /// Starting schedule; a blank one for the kind when omitted.
    pub schedule: Option<ScheduleModel>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: String,
    pub owner_user_id: String,
    pub title: String,
    pub location: Option<String>,
    pub activity_kind: String,
    pub schedule: ScheduleModel,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<Activity> for ActivityResponse {
    type Error = AppError;

    fn try_from(activity: Activity) -> Result<Self, Self::Error> {
        let schedule = ScheduleModel::from_json(&activity.schedule_json)?;
        Ok(ActivityResponse {
            id: activity.id,
            owner_user_id: activity.owner_user_id,
            title: activity.title,
            location: activity.location,
            activity_kind: activity.activity_kind,
            schedule,
            version: activity.version,
            created_at: activity.created_at,
            updated_at: activity.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScheduleRequest {
    /// Model to store; the current draft when omitted.
    pub model: Option<ScheduleModel>,
    pub expected_version: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[serde(default = "default_guest_count")]
    pub guest_count: i64,
}

fn default_guest_count() -> i64 {
    1
}

// ============================================================================
// Activities
// ============================================================================

async fn create_activity(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateActivityRequest>,
) -> AppResult<(StatusCode, Json<ActivityResponse>)> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }

    let schedule = match request.schedule {
        Some(model) if model.activity_kind != request.activity_kind => {
            return Err(AppError::BadRequest(format!(
                "schedule is for a {} but the activity is a {}",
                model.activity_kind.as_str(),
                request.activity_kind.as_str()
            )));
        }
        Some(model) if !model.activity_kind.allows(&model.schedule) => {
            return Err(AppError::BadRequest(format!(
                "schedule type '{}' is not allowed for a {}",
                model.schedule.name(),
                model.activity_kind.as_str()
            )));
        }
        Some(model) => model,
        None => ScheduleModel::new_for(request.activity_kind),
    };

    let activity = ActivityRepository::create(
        &state.db,
        &user.id,
        &CreateActivity {
            title: request.title.trim().to_string(),
            location: request.location,
            activity_kind: request.activity_kind.as_str().to_string(),
            schedule_json: schedule.to_json()?,
        },
    )
    .await?;

    tracing::info!("User {} created {} {}", user.id, activity.activity_kind, activity.id);
    Ok((StatusCode::CREATED, Json(activity.try_into()?)))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ActivityResponse>> {
    let activity = ActivityRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))?;
    Ok(Json(activity.try_into()?))
}

// ============================================================================
// Schedule editing
// ============================================================================

async fn get_schedule(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ScheduleState>> {
    Ok(Json(state.drafts.current(&state.db, &user.id, &id).await?))
}

async fn save_schedule_edit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(op): Json<BuilderOp>,
) -> Result<Json<ScheduleState>, AppErrorWithDetails> {
    let saved = state.drafts.save_edit(&state.db, &user.id, &id, op).await?;
    state.calendar.invalidate_for_activity(&state.db, &id).await;
    Ok(Json(saved))
}

async fn submit_schedule(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<SubmitScheduleRequest>,
) -> Result<Json<ScheduleState>, AppErrorWithDetails> {
    let saved = state
        .drafts
        .submit(&state.db, &user.id, &id, request.model, request.expected_version)
        .await?;
    state.calendar.invalidate_for_activity(&state.db, &id).await;
    Ok(Json(saved))
}

async fn discard_draft(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ScheduleState>> {
    Ok(Json(state.drafts.discard(&state.db, &user.id, &id).await?))
}

// ============================================================================
// Bookings
// ============================================================================

async fn create_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    if ActivityRepository::find_by_id(&state.db, &id).await?.is_none() {
        return Err(AppError::NotFound(format!("Activity {} not found", id)));
    }

    let booking = BookingRepository::create(
        &state.db,
        &id,
        &user.id,
        BookingStatus::Pending,
        request.guest_count,
    )
    .await?;
    state
        .calendar
        .invalidate_watchers_of(&state.db, &[user.id.clone()])
        .await;

    tracing::info!("User {} booked activity {} ({})", user.id, id, booking.id);
    Ok((StatusCode::CREATED, Json(booking)))
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{send, state};

    async fn new_camp(state: &std::sync::Arc<crate::AppState>) -> String {
        let (status, body) = send(
            state,
            "POST",
            "/api/activities",
            Some("owner"),
            Some(json!({ "title": "Art camp", "activityKind": "camp" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["schedule"]["schedule"]["type"], "fixed");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn edits_are_applied_one_op_at_a_time() {
        let state = state().await;
        let id = new_camp(&state).await;
        let edits = format!("/api/activities/{}/schedule/edits", id);

        let (status, body) = send(
            &state,
            "POST",
            &edits,
            Some("owner"),
            Some(json!({ "op": "switch_schedule_type", "schedule_type": "campSessions" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 2);

        let (_, body) = send(
            &state,
            "POST",
            &edits,
            Some("owner"),
            Some(json!({ "op": "duplicate_session", "index": 0 })),
        )
        .await;
        let sessions = body["model"]["schedule"]["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_ne!(sessions[0]["id"], sessions[1]["id"]);

        let (status, body) = send(
            &state,
            "POST",
            &edits,
            Some("owner"),
            Some(json!({ "op": "toggle_day_available", "day": "monday" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_EDITOR_OPERATION");
    }

    #[tokio::test]
    async fn stale_submit_returns_the_draft() {
        let state = state().await;
        let id = new_camp(&state).await;
        let model = json!({
            "activityKind": "camp",
            "schedule": {
                "type": "fixed",
                "startDate": "2025-08-04",
                "endDate": "2025-08-08",
                "allDay": true
            }
        });

        let (status, _) = send(
            &state,
            "PUT",
            &format!("/api/activities/{}/schedule", id),
            Some("owner"),
            Some(json!({ "model": model, "expectedVersion": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &state,
            "PUT",
            &format!("/api/activities/{}/schedule", id),
            Some("owner"),
            Some(json!({ "model": model, "expectedVersion": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["details"]["draft"]["schedule"]["startDate"], "2025-08-04");

        let (_, current) = send(
            &state,
            "GET",
            &format!("/api/activities/{}/schedule", id),
            Some("owner"),
            None,
        )
        .await;
        assert_eq!(current["hasDraft"], true);

        let (status, discarded) = send(
            &state,
            "DELETE",
            &format!("/api/activities/{}/schedule/draft", id),
            Some("owner"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(discarded["hasDraft"], false);
        assert_eq!(discarded["version"], 2);
    }

    #[tokio::test]
    async fn invalid_submit_lists_problems() {
        let state = state().await;
        let id = new_camp(&state).await;

        let (status, body) = send(
            &state,
            "PUT",
            &format!("/api/activities/{}/schedule", id),
            Some("owner"),
            Some(json!({
                "model": {
                    "activityKind": "camp",
                    "schedule": {
                        "type": "fixed",
                        "startDate": "2025-08-04",
                        "startTime": "09:00"
                    }
                },
                "expectedVersion": 1
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!body["error"]["details"]["problems"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn others_cannot_edit_but_can_read() {
        let state = state().await;
        let id = new_camp(&state).await;

        let (status, _) = send(
            &state,
            "GET",
            &format!("/api/activities/{}/schedule", id),
            Some("stranger"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &state,
            "GET",
            &format!("/api/activities/{}", id),
            Some("stranger"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Art camp");
    }

    fn camp_sessions(date: &str) -> serde_json::Value {
        json!({
            "activityKind": "camp",
            "schedule": {
                "type": "campSessions",
                "sessions": [
                    {
                        "id": "s1",
                        "startDate": date,
                        "endDate": date,
                        "startTime": "09:00",
                        "endTime": "15:00"
                    }
                ]
            }
        })
    }

    async fn upcoming_days(state: &std::sync::Arc<crate::AppState>, user: &str) -> Vec<String> {
        let (_, view) = send(state, "GET", "/api/calendar/upcoming", Some(user), None).await;
        view["days"].as_object().unwrap().keys().cloned().collect()
    }

    #[tokio::test]
    async fn rescheduling_moves_booked_calendars() {
        let state = state().await;
        let (_, activity) = send(
            &state,
            "POST",
            "/api/activities",
            Some("owner"),
            Some(json!({
                "title": "Sailing camp",
                "activityKind": "camp",
                "schedule": camp_sessions("2099-07-01")
            })),
        )
        .await;
        let id = activity["id"].as_str().unwrap().to_string();

        assert!(upcoming_days(&state, "parent").await.is_empty());
        send(
            &state,
            "POST",
            "/api/shares",
            Some("kid"),
            Some(json!({ "granteeUserId": "parent" })),
        )
        .await;
        send(&state, "POST", "/api/shares/kid/accept", Some("parent"), None).await;

        let (status, _) = send(
            &state,
            "POST",
            &format!("/api/activities/{}/bookings", id),
            Some("kid"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(upcoming_days(&state, "kid").await, vec!["2099-07-01"]);
        assert_eq!(upcoming_days(&state, "parent").await, vec!["2099-07-01"]);

        let (status, _) = send(
            &state,
            "PUT",
            &format!("/api/activities/{}/schedule", id),
            Some("owner"),
            Some(json!({ "model": camp_sessions("2099-08-15"), "expectedVersion": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(upcoming_days(&state, "kid").await, vec!["2099-08-15"]);
        assert_eq!(upcoming_days(&state, "parent").await, vec!["2099-08-15"]);
    }

    #[tokio::test]
    async fn class_schedule_must_match_kind() {
        let state = state().await;
        let (status, _) = send(
            &state,
            "POST",
            "/api/activities",
            Some("owner"),
            Some(json!({
                "title": "Piano",
                "activityKind": "class",
                "schedule": {
                    "activityKind": "class",
                    "schedule": { "type": "fixed", "startDate": "2025-08-04" }
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
