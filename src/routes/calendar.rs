use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::calendar::{CalendarView, SourceView};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upcoming", get(get_upcoming))
        .route("/month", get(get_month))
        .route("/sources", get(list_sources))
        .route("/sources/:source_id/visibility", put(set_visibility))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    /// Re-fetch every source instead of reading the stored snapshot.
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    start: String,
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    visible: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_upcoming(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<RefreshQuery>,
) -> AppResult<Json<CalendarView>> {
    let view = state.calendar.get_upcoming(&user.id, query.refresh).await?;
    Ok(Json(view))
}

async fn get_month(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<MonthQuery>,
) -> AppResult<Json<CalendarView>> {
    let month_start = NaiveDate::parse_from_str(&query.start, "%Y-%m-%d").map_err(|_| {
        AppError::BadRequest(format!(
            "Invalid month start '{}', expected YYYY-MM-01",
            query.start
        ))
    })?;

    let view = state
        .calendar
        .get_month(&user.id, month_start, query.refresh)
        .await?;
    Ok(Json(view))
}

async fn list_sources(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<SourceView>>> {
    Ok(Json(state.calendar.sources(&user.id).await?))
}

async fn set_visibility(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(source_id): Path<String>,
    Json(request): Json<VisibilityRequest>,
) -> AppResult<Json<Vec<SourceView>>> {
    let sources = state
        .calendar
        .set_source_visible(&user.id, &source_id, request.visible)
        .await?;
    Ok(Json(sources))
}
