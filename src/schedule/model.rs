use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::age::AgeRange;
use super::pricing::Pricing;

// ============================================================================
// Activity kind & weekdays
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Camp,
    Class,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Camp => "camp",
            ActivityKind::Class => "class",
        }
    }

    /// Whether a schedule variant may describe an activity of this kind.
    pub fn allows(&self, schedule: &ScheduleKind) -> bool {
        matches!(
            (self, schedule),
            (ActivityKind::Camp, ScheduleKind::Fixed(_))
                | (ActivityKind::Camp, ScheduleKind::OngoingWeekly(_))
                | (ActivityKind::Camp, ScheduleKind::CampSessions(_))
                | (ActivityKind::Class, ScheduleKind::ClassOngoing(_))
                | (ActivityKind::Class, ScheduleKind::ClassSessions(_))
        )
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "camp" => Ok(ActivityKind::Camp),
            "class" => Ok(ActivityKind::Class),
            other => Err(format!("unknown activity kind '{}'", other)),
        }
    }
}

/// Day of the week used as a key in weekly schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "monday",
            Day::Tuesday => "tuesday",
            Day::Wednesday => "wednesday",
            Day::Thursday => "thursday",
            Day::Friday => "friday",
            Day::Saturday => "saturday",
            Day::Sunday => "sunday",
        }
    }

    pub fn to_weekday(self) -> chrono::Weekday {
        match self {
            Day::Monday => chrono::Weekday::Mon,
            Day::Tuesday => chrono::Weekday::Tue,
            Day::Wednesday => chrono::Weekday::Wed,
            Day::Thursday => chrono::Weekday::Thu,
            Day::Friday => chrono::Weekday::Fri,
            Day::Saturday => chrono::Weekday::Sat,
            Day::Sunday => chrono::Weekday::Sun,
        }
    }

    pub fn from_weekday(weekday: chrono::Weekday) -> Self {
        match weekday {
            chrono::Weekday::Mon => Day::Monday,
            chrono::Weekday::Tue => Day::Tuesday,
            chrono::Weekday::Wed => Day::Wednesday,
            chrono::Weekday::Thu => Day::Thursday,
            chrono::Weekday::Fri => Day::Friday,
            chrono::Weekday::Sat => Day::Saturday,
            chrono::Weekday::Sun => Day::Sunday,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Day {
    type Err = String;

    /// Accepts full lowercase names and the common three-letter forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(Day::Monday),
            "tuesday" | "tue" => Ok(Day::Tuesday),
            "wednesday" | "wed" => Ok(Day::Wednesday),
            "thursday" | "thu" => Ok(Day::Thursday),
            "friday" | "fri" => Ok(Day::Friday),
            "saturday" | "sat" => Ok(Day::Saturday),
            "sunday" | "sun" => Ok(Day::Sunday),
            _ => Err(format!("unknown day '{}'", s)),
        }
    }
}

// ============================================================================
// Schedule variants
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatRule {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

/// Single date range, optionally all-day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedSchedule {
    #[serde(default)]
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub repeat_rule: RepeatRule,
}

/// A start/end pair of wall-clock times. Empty strings mean "not filled in yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub id: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

impl TimeBlock {
    pub fn empty() -> Self {
        Self::new(String::new(), String::new())
    }

    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        TimeBlock {
            id: new_item_id(),
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Open recurrence window with at most one block per weekday.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OngoingWeeklySchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub weekly: BTreeMap<Day, TimeBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub waitlist_enabled: bool,
}

impl Session {
    pub fn blank() -> Self {
        Session {
            id: new_item_id(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampSessionsSchedule {
    pub sessions: Vec<Session>,
}

impl Default for CampSessionsSchedule {
    fn default() -> Self {
        CampSessionsSchedule {
            sessions: vec![Session::blank()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub blocks: Vec<TimeBlock>,
}

/// Ongoing class: each weekday may hold several disjoint blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassOngoingSchedule {
    #[serde(default)]
    pub weekly: BTreeMap<Day, DayAvailability>,
}

impl Default for ClassOngoingSchedule {
    fn default() -> Self {
        ClassOngoingSchedule {
            weekly: Day::ALL
                .iter()
                .map(|day| (*day, DayAvailability::default()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<Day>,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl Section {
    pub fn blank() -> Self {
        Section {
            id: new_item_id(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSessionsSchedule {
    pub sections: Vec<Section>,
}

impl Default for ClassSessionsSchedule {
    fn default() -> Self {
        ClassSessionsSchedule {
            sections: vec![Section::blank()],
        }
    }
}

/// How an activity is timed. Exactly one shape is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScheduleKind {
    Fixed(FixedSchedule),
    OngoingWeekly(OngoingWeeklySchedule),
    CampSessions(CampSessionsSchedule),
    ClassOngoing(ClassOngoingSchedule),
    ClassSessions(ClassSessionsSchedule),
}

impl ScheduleKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScheduleKind::Fixed(_) => "fixed",
            ScheduleKind::OngoingWeekly(_) => "ongoingWeekly",
            ScheduleKind::CampSessions(_) => "campSessions",
            ScheduleKind::ClassOngoing(_) => "classOngoing",
            ScheduleKind::ClassSessions(_) => "classSessions",
        }
    }

    /// A fresh, empty instance of the named variant.
    pub fn blank(name: &str) -> Option<Self> {
        match name {
            "fixed" => Some(ScheduleKind::Fixed(FixedSchedule::default())),
            "ongoingWeekly" => Some(ScheduleKind::OngoingWeekly(OngoingWeeklySchedule::default())),
            "campSessions" => Some(ScheduleKind::CampSessions(CampSessionsSchedule::default())),
            "classOngoing" => Some(ScheduleKind::ClassOngoing(ClassOngoingSchedule::default())),
            "classSessions" => Some(ScheduleKind::ClassSessions(ClassSessionsSchedule::default())),
            _ => None,
        }
    }
}

// ============================================================================
// Schedule model
// ============================================================================

/// Everything the editor authors about when and for whom an activity runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleModel {
    pub activity_kind: ActivityKind,
    pub schedule: ScheduleKind,
    #[serde(default)]
    pub age_range: AgeRange,
    #[serde(default)]
    pub pricing: Pricing,
}

impl ScheduleModel {
    /// The default model a newly created activity starts with.
    pub fn new_for(kind: ActivityKind) -> Self {
        let schedule = match kind {
            ActivityKind::Camp => ScheduleKind::Fixed(FixedSchedule::default()),
            ActivityKind::Class => ScheduleKind::ClassOngoing(ClassOngoingSchedule::default()),
        };

        ScheduleModel {
            activity_kind: kind,
            schedule,
            age_range: AgeRange::default(),
            pricing: Pricing::default(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

pub fn new_item_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
