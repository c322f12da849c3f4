use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::CalendarShare;
use crate::db::{CalendarShareRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_granted).post(create_share))
        .route("/incoming", get(list_incoming))
        .route("/:owner_id/accept", post(accept_share))
        .route("/:grantee_id", delete(revoke_share))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    pub grantee_user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    #[serde(flatten)]
    pub share: CalendarShare,
    /// Display name of the other party.
    pub display_name: String,
}

/// Shares the caller has handed out.
async fn list_granted(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<ShareResponse>>> {
    let rows = CalendarShareRepository::list_with_grantee_info(&state.db, &user.id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(share, display_name)| ShareResponse {
                share,
                display_name,
            })
            .collect(),
    ))
}

/// Shares offered to the caller.
async fn list_incoming(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<ShareResponse>>> {
    let rows = CalendarShareRepository::list_with_owner_info(&state.db, &user.id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(share, display_name)| ShareResponse {
                share,
                display_name,
            })
            .collect(),
    ))
}

async fn create_share(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateShareRequest>,
) -> AppResult<(StatusCode, Json<CalendarShare>)> {
    if UserRepository::find_by_id(&state.db, &request.grantee_user_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!(
            "User {} not found",
            request.grantee_user_id
        )));
    }

    let share =
        CalendarShareRepository::create(&state.db, &user.id, &request.grantee_user_id).await?;
    tracing::info!(
        "User {} offered their calendar to {}",
        user.id,
        request.grantee_user_id
    );
    Ok((StatusCode::CREATED, Json(share)))
}

async fn accept_share(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(owner_id): Path<String>,
) -> AppResult<Json<CalendarShare>> {
    let share = CalendarShareRepository::accept(&state.db, &owner_id, &user.id).await?;
    state.calendar.invalidate(&user.id).await;
    Ok(Json(share))
}

async fn revoke_share(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(grantee_id): Path<String>,
) -> AppResult<StatusCode> {
    CalendarShareRepository::delete(&state.db, &user.id, &grantee_id).await?;
    state.calendar.invalidate(&grantee_id).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{send, state};

    #[tokio::test]
    async fn share_lifecycle() {
        let state = state().await;
        // Both parties are registered on first authenticated request.
        send(&state, "GET", "/api/shares", Some("ana"), None).await;
        send(&state, "GET", "/api/shares", Some("viewer"), None).await;

        let (status, share) = send(
            &state,
            "POST",
            "/api/shares",
            Some("ana"),
            Some(json!({ "granteeUserId": "viewer" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(share["status"], "pending");

        let (_, incoming) = send(&state, "GET", "/api/shares/incoming", Some("viewer"), None).await;
        assert_eq!(incoming[0]["displayName"], "User ana");

        let (status, accepted) =
            send(&state, "POST", "/api/shares/ana/accept", Some("viewer"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["status"], "accepted");

        let (_, sources) = send(&state, "GET", "/api/calendar/sources", Some("viewer"), None).await;
        assert_eq!(sources.as_array().unwrap().len(), 2);

        let (status, _) = send(&state, "DELETE", "/api/shares/viewer", Some("ana"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, sources) = send(&state, "GET", "/api/calendar/sources", Some("viewer"), None).await;
        assert_eq!(sources.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sharing_with_unknown_user_is_not_found() {
        let state = state().await;
        let (status, _) = send(
            &state,
            "POST",
            "/api/shares",
            Some("ana"),
            Some(json!({ "granteeUserId": "ghost" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
