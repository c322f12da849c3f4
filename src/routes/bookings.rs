use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::db::models::{Booking, BookingStatus};
use crate::db::{ActivityRepository, BookingRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:id/cancel", post(cancel_booking))
}

/// Cancel a booking. Allowed for the booked user and for the activity owner.
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Booking>> {
    let booking = BookingRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))?;

    if booking.user_id != user.id {
        let owns_activity = ActivityRepository::find_by_id(&state.db, &booking.activity_id)
            .await?
            .is_some_and(|a| a.owner_user_id == user.id);
        if !owns_activity {
            return Err(AppError::Forbidden);
        }
    }

    let cancelled = BookingRepository::update_status(&state.db, &id, BookingStatus::Cancelled).await?;
    state
        .calendar
        .invalidate_watchers_of(&state.db, &[booking.user_id.clone()])
        .await;

    tracing::info!("User {} cancelled booking {}", user.id, id);
    Ok(Json(cancelled))
}
