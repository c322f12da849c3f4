use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Activity Models
// ============================================================================

/// Stored activity row. `schedule_json` holds a serialized `ScheduleModel`;
/// `version` increases on every schedule write.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub owner_user_id: String,
    pub title: String,
    pub location: Option<String>,
    pub activity_kind: String,
    pub schedule_json: String,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivity {
    pub title: String,
    pub location: Option<String>,
    pub activity_kind: String,
    pub schedule_json: String,
}
