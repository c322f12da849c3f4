use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Calendar Share Models
// ============================================================================

pub const SHARE_PENDING: &str = "pending";
pub const SHARE_ACCEPTED: &str = "accepted";

/// Owner lets the grantee read their booking calendar once `status` is accepted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CalendarShare {
    pub id: String,
    pub owner_user_id: String,
    pub grantee_user_id: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
