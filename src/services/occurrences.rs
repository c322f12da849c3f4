use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::db::models::{BookingStatus, RawBookingRow};
use crate::schedule::ScheduleModel;
use crate::services::resolver::TimeResolver;

/// Source id of the viewer's own bookings.
pub const SELF_SOURCE: &str = "self";

/// One booked activity placed on a timeline. Rebuilt on every aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOccurrence {
    pub id: String,
    pub activity_id: String,
    pub source_id: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub title: String,
    pub location: Option<String>,
    pub booking_status: BookingStatus,
    pub guest_count: i64,
}

#[derive(Debug, Clone)]
pub struct OccurrenceProjector {
    resolver: TimeResolver,
}

impl OccurrenceProjector {
    pub fn new(resolver: TimeResolver) -> Self {
        OccurrenceProjector { resolver }
    }

    pub fn resolver(&self) -> &TimeResolver {
        &self.resolver
    }

    /// Project booking rows from one source. Rows whose schedule cannot be
    /// decoded or placed on the timeline are dropped.
    pub fn project(
        &self,
        rows: &[RawBookingRow],
        source_id: &str,
        today: NaiveDate,
    ) -> Vec<EventOccurrence> {
        rows.iter()
            .filter_map(|row| self.project_row(row, source_id, today))
            .collect()
    }

    fn project_row(
        &self,
        row: &RawBookingRow,
        source_id: &str,
        today: NaiveDate,
    ) -> Option<EventOccurrence> {
        let status: BookingStatus = match row.status.parse() {
            Ok(status) => status,
            Err(e) => {
                debug!("Skipping booking {}: {}", row.booking_id, e);
                return None;
            }
        };
        if !status.is_on_calendar() {
            return None;
        }

        let model = match ScheduleModel::from_json(&row.schedule_json) {
            Ok(model) => model,
            Err(e) => {
                debug!(
                    "Skipping activity {}: schedule does not decode: {:?}",
                    row.activity_id, e
                );
                return None;
            }
        };

        let Some(range) = self.resolver.resolve(&model.schedule, today) else {
            debug!(
                "Skipping activity {}: {} schedule does not resolve",
                row.activity_id,
                model.schedule.name()
            );
            return None;
        };

        let id = if source_id == SELF_SOURCE {
            row.booking_id.clone()
        } else {
            format!("{}:{}", source_id, row.booking_id)
        };

        Some(EventOccurrence {
            id,
            activity_id: row.activity_id.clone(),
            source_id: source_id.to_string(),
            start: range.start.fixed_offset(),
            end: range.end.fixed_offset(),
            title: row.title.clone(),
            location: row.location.clone(),
            booking_status: status,
            guest_count: row.guest_count,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schedule::{ActivityKind, FixedSchedule, ScheduleKind};

    pub(crate) fn fixed_row(booking_id: &str, date: &str, time: &str) -> RawBookingRow {
        let mut model = ScheduleModel::new_for(ActivityKind::Camp);
        model.schedule = ScheduleKind::Fixed(FixedSchedule {
            start_date: date.to_string(),
            start_time: Some(time.to_string()),
            ..Default::default()
        });
        RawBookingRow {
            booking_id: booking_id.to_string(),
            activity_id: format!("activity-{}", booking_id),
            status: "confirmed".to_string(),
            guest_count: 1,
            title: format!("Activity {}", booking_id),
            location: None,
            schedule_json: model.to_json().unwrap(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn own_and_shared_ids_differ() {
        let projector = OccurrenceProjector::new(TimeResolver::default());
        let rows = vec![fixed_row("b1", "2025-06-02", "09:00")];

        let own = projector.project(&rows, SELF_SOURCE, today());
        assert_eq!(own[0].id, "b1");
        assert_eq!(own[0].source_id, "self");

        let shared = projector.project(&rows, "friend-7", today());
        assert_eq!(shared[0].id, "friend-7:b1");
        assert_eq!(shared[0].end.to_rfc3339(), "2025-06-02T11:00:00+00:00");
    }

    #[test]
    fn unresolvable_and_inactive_rows_are_dropped() {
        let projector = OccurrenceProjector::new(TimeResolver::default());

        let mut cancelled = fixed_row("b2", "2025-06-02", "09:00");
        cancelled.status = "cancelled".to_string();
        let mut garbage = fixed_row("b3", "2025-06-02", "09:00");
        garbage.schedule_json = "{not json".to_string();
        let no_time = fixed_row("b4", "2025-06-02", "");
        let bad_date = fixed_row("b5", "2025-13-40", "09:00");
        let good = fixed_row("b6", "2025-06-03", "10:00");

        let out = projector.project(
            &[cancelled, garbage, no_time, bad_date, good],
            SELF_SOURCE,
            today(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "b6");
    }
}
