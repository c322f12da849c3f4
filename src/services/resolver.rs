//! Turns a schedule variant into one concrete, zone-aware time range.
//!
//! Resolution is pure: the caller supplies "today" and the deployment
//! configuration. Anything that cannot be placed on a timeline resolves to
//! `None`; a field that is present but unparseable never falls back to a
//! default.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::config::ScheduleConfig;
use crate::schedule::{
    CampSessionsSchedule, ClassOngoingSchedule, ClassSessionsSchedule, Day, FixedSchedule,
    OngoingWeeklySchedule, ScheduleKind, Session, TimeBlock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub zone: Tz,
    pub default_duration: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            zone: Tz::UTC,
            default_duration: Duration::hours(2),
        }
    }
}

impl From<&ScheduleConfig> for ResolverConfig {
    fn from(config: &ScheduleConfig) -> Self {
        ResolverConfig {
            zone: config.time_zone,
            default_duration: Duration::minutes(config.default_session_minutes),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimeResolver {
    config: ResolverConfig,
}

impl TimeResolver {
    pub fn new(config: ResolverConfig) -> Self {
        TimeResolver { config }
    }

    pub fn zone(&self) -> Tz {
        self.config.zone
    }

    /// Local calendar date of "now" in the deployment zone.
    pub fn today(&self, now: DateTime<chrono::Utc>) -> NaiveDate {
        now.with_timezone(&self.config.zone).date_naive()
    }

    pub fn resolve(&self, kind: &ScheduleKind, today: NaiveDate) -> Option<TimeRange> {
        match kind {
            ScheduleKind::Fixed(fixed) => self.resolve_fixed(fixed),
            ScheduleKind::OngoingWeekly(weekly) => self.resolve_ongoing_weekly(weekly, today),
            ScheduleKind::CampSessions(camp) => self.resolve_camp_sessions(camp),
            ScheduleKind::ClassOngoing(class) => self.resolve_class_ongoing(class, today),
            ScheduleKind::ClassSessions(class) => self.resolve_class_sessions(class, today),
        }
    }

    fn resolve_fixed(&self, fixed: &FixedSchedule) -> Option<TimeRange> {
        let start_date = parse_date(Some(fixed.start_date.as_str()))??;
        let end_date = parse_date(fixed.end_date.as_deref())?.unwrap_or(start_date);

        if fixed.all_day {
            let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)?;
            let start = self.localize(start_date.and_time(NaiveTime::MIN))?;
            let end = self.localize(end_date.max(start_date).and_time(end_of_day))?;
            return Some(TimeRange { start, end });
        }

        let start_time = parse_time(fixed.start_time.as_deref())??;
        let end_time = parse_time(fixed.end_time.as_deref())?;
        self.range_from(start_date.and_time(start_time), end_time.map(|t| end_date.and_time(t)))
    }

    /// A camp session is a dated, non-all-day range.
    fn resolve_session(&self, session: &Session) -> Option<TimeRange> {
        let start_date = parse_date(Some(session.start_date.as_str()))??;
        let end_date = parse_date(Some(session.end_date.as_str()))?.unwrap_or(start_date);
        let start_time = parse_time(Some(session.start_time.as_str()))??;
        let end_time = parse_time(Some(session.end_time.as_str()))?;
        self.range_from(start_date.and_time(start_time), end_time.map(|t| end_date.and_time(t)))
    }

    fn resolve_camp_sessions(&self, camp: &CampSessionsSchedule) -> Option<TimeRange> {
        earliest(camp.sessions.iter().map(|s| self.resolve_session(s)))
    }

    fn resolve_ongoing_weekly(
        &self,
        weekly: &OngoingWeeklySchedule,
        today: NaiveDate,
    ) -> Option<TimeRange> {
        let window_start = parse_date(weekly.start_date.as_deref())?;
        let window_end = parse_date(weekly.end_date.as_deref())?;
        let anchor = window_start.map_or(today, |start| start.max(today));

        let (date, block) = next_days(anchor).find_map(|date| {
            let block = weekly.weekly.get(&Day::from_weekday(date.weekday()))?;
            has_start(block).then_some((date, block))
        })?;

        if window_end.is_some_and(|end| date > end) {
            return None;
        }

        self.resolve_block(date, block)
    }

    fn resolve_class_ongoing(
        &self,
        class: &ClassOngoingSchedule,
        today: NaiveDate,
    ) -> Option<TimeRange> {
        let (date, block) = next_days(today).find_map(|date| {
            let day = class.weekly.get(&Day::from_weekday(date.weekday()))?;
            if !day.available {
                return None;
            }
            day.blocks.iter().find(|b| has_start(b)).map(|b| (date, b))
        })?;

        self.resolve_block(date, block)
    }

    fn resolve_class_sessions(
        &self,
        class: &ClassSessionsSchedule,
        today: NaiveDate,
    ) -> Option<TimeRange> {
        earliest(class.sections.iter().map(|section| {
            let day = section.day?;
            let date = next_days(today).find(|d| d.weekday() == day.to_weekday())?;
            let start = parse_time(Some(section.start_time.as_str()))??;
            let end = parse_time(Some(section.end_time.as_str()))?;
            self.range_from(date.and_time(start), end.map(|t| date.and_time(t)))
        }))
    }

    fn resolve_block(&self, date: NaiveDate, block: &TimeBlock) -> Option<TimeRange> {
        let start = parse_time(Some(block.start.as_str()))??;
        let end = parse_time(Some(block.end.as_str()))?;
        self.range_from(date.and_time(start), end.map(|t| date.and_time(t)))
    }

    /// Applies the default duration when the end is missing or lands before the start.
    fn range_from(&self, start: NaiveDateTime, end: Option<NaiveDateTime>) -> Option<TimeRange> {
        let start = self.localize(start)?;
        let end = match end {
            Some(end) => self.localize(end)?,
            None => start + self.config.default_duration,
        };

        if end < start {
            return Some(TimeRange {
                start,
                end: start + self.config.default_duration,
            });
        }

        Some(TimeRange { start, end })
    }

    /// Local wall-clock time to an instant. Times inside a DST gap move forward one hour.
    fn localize(&self, local: NaiveDateTime) -> Option<DateTime<Tz>> {
        let zone = self.config.zone;
        zone.from_local_datetime(&local)
            .earliest()
            .or_else(|| zone.from_local_datetime(&(local + Duration::hours(1))).earliest())
    }
}

/// `None` for invalid input, `Some(None)` for a missing (absent or blank) field.
fn parse_date(raw: Option<&str>) -> Option<Option<NaiveDate>> {
    match raw.map(str::trim) {
        None | Some("") => Some(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Some),
    }
}

/// Same contract as [`parse_date`]; accepts `HH:MM` and `HH:MM:SS`.
fn parse_time(raw: Option<&str>) -> Option<Option<NaiveTime>> {
    match raw.map(str::trim) {
        None | Some("") => Some(None),
        Some(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .ok()
            .map(Some),
    }
}

pub(crate) fn is_valid_date(raw: &str) -> bool {
    parse_date(Some(raw)).is_some()
}

pub(crate) fn is_valid_time(raw: &str) -> bool {
    parse_time(Some(raw)).is_some()
}

pub(crate) fn date_value(raw: &str) -> Option<NaiveDate> {
    parse_date(Some(raw)).flatten()
}

fn has_start(block: &TimeBlock) -> bool {
    !block.start.trim().is_empty()
}

fn next_days(from: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take(7)
}

/// Earliest-starting range; ties keep the first one seen.
fn earliest(ranges: impl Iterator<Item = Option<TimeRange>>) -> Option<TimeRange> {
    ranges.flatten().fold(None, |best: Option<TimeRange>, range| match best {
        Some(b) if b.start <= range.start => Some(b),
        _ => Some(range),
    })
}
