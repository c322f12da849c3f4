//! Authoring side of the schedule model.
//!
//! [`ScheduleEditor`] applies one [`BuilderOp`] at a time and hands back the
//! resulting snapshot. An op either applies completely or is rejected with an
//! [`EditorError`] and leaves the editor untouched. Cross-field checks live in
//! [`validate_for_submit`], not here.

use std::collections::btree_map::Entry;

use serde::Deserialize;

use crate::schedule::{
    new_item_id, AgeBucket, Day, DayAvailability, FixedSchedule, Pricing, RepeatRule,
    ScheduleKind, ScheduleModel, Section, Session, TimeBlock,
};
use crate::services::resolver::{date_value, is_valid_date, is_valid_time};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    #[error("unknown day '{0}'")]
    UnknownDay(String),

    #[error("unknown age bucket '{0}'")]
    UnknownAgeBucket(String),

    #[error("unknown schedule type '{0}'")]
    UnknownScheduleType(String),

    #[error("operation '{op}' does not apply to a {schedule} schedule")]
    WrongScheduleType {
        op: &'static str,
        schedule: &'static str,
    },

    #[error("schedule type '{schedule}' is not allowed for a {kind}")]
    KindMismatch {
        schedule: &'static str,
        kind: &'static str,
    },

    #[error("no {item} at index {index}")]
    IndexOutOfRange { item: &'static str, index: usize },

    #[error("{0} is not available; enable the day before editing its time blocks")]
    DayUnavailable(Day),
}

/// One edit, as sent by the schedule form.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BuilderOp {
    AddSession,
    RemoveSession { index: usize },
    DuplicateSession { index: usize },
    UpdateSession { index: usize, session: SessionFields },
    AddSection,
    RemoveSection { index: usize },
    DuplicateSection { index: usize },
    UpdateSection { index: usize, section: SectionFields },
    AddTimeBlock { day: String },
    RemoveTimeBlock { day: String, index: usize },
    DuplicateTimeBlock { day: String, index: usize },
    UpdateTimeBlock { day: String, index: usize, start: String, end: String },
    ToggleDayAvailable { day: String },
    SetWeeklyBlock { day: String, start: String, end: String },
    ClearWeeklyBlock { day: String },
    SetOngoingWindow { start_date: Option<String>, end_date: Option<String> },
    UpdateFixed { fixed: FixedFields },
    SwitchScheduleType { schedule_type: String },
    ToggleAgeBucket { bucket: String },
    SetPricing { pricing: Pricing },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFields {
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

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionFields {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedFields {
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub repeat_rule: RepeatRule,
}

#[derive(Debug, Clone)]
pub struct ScheduleEditor {
    model: ScheduleModel,
}

impl ScheduleEditor {
    pub fn new(model: ScheduleModel) -> Self {
        ScheduleEditor { model }
    }

    pub fn snapshot(&self) -> &ScheduleModel {
        &self.model
    }

    pub fn into_model(self) -> ScheduleModel {
        self.model
    }

    /// Apply an op to a copy of the current model and commit it only on success.
    pub fn apply(&mut self, op: BuilderOp) -> Result<ScheduleModel, EditorError> {
        let mut next = self.model.clone();
        apply_to(&mut next, op)?;
        self.model = next.clone();
        Ok(next)
    }

    pub fn add_session(&mut self) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::AddSession)
    }

    pub fn remove_session(&mut self, index: usize) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::RemoveSession { index })
    }

    pub fn duplicate_session(&mut self, index: usize) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::DuplicateSession { index })
    }

    pub fn add_section(&mut self) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::AddSection)
    }

    pub fn remove_section(&mut self, index: usize) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::RemoveSection { index })
    }

    pub fn duplicate_section(&mut self, index: usize) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::DuplicateSection { index })
    }

    pub fn add_time_block(&mut self, day: Day) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::AddTimeBlock {
            day: day.to_string(),
        })
    }

    pub fn remove_time_block(&mut self, day: Day, index: usize) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::RemoveTimeBlock {
            day: day.to_string(),
            index,
        })
    }

    pub fn duplicate_time_block(
        &mut self,
        day: Day,
        index: usize,
    ) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::DuplicateTimeBlock {
            day: day.to_string(),
            index,
        })
    }

    pub fn toggle_day_available(&mut self, day: Day) -> Result<ScheduleModel, EditorError> {
        self.apply(BuilderOp::ToggleDayAvailable {
            day: day.to_string(),
        })
    }
}

fn apply_to(model: &mut ScheduleModel, op: BuilderOp) -> Result<(), EditorError> {
    match op {
        BuilderOp::AddSession => sessions_mut(model, "add_session")?.push(Session::blank()),
        BuilderOp::RemoveSession { index } => {
            remove_keeping_one(sessions_mut(model, "remove_session")?, index, "session")?
        }
        BuilderOp::DuplicateSession { index } => {
            duplicate_after(sessions_mut(model, "duplicate_session")?, index, "session", |s| {
                s.id = new_item_id()
            })?
        }
        BuilderOp::UpdateSession { index, session } => {
            let sessions = sessions_mut(model, "update_session")?;
            let target = sessions
                .get_mut(index)
                .ok_or(EditorError::IndexOutOfRange {
                    item: "session",
                    index,
                })?;
            *target = Session {
                id: target.id.clone(),
                start_date: session.start_date,
                end_date: session.end_date,
                start_time: session.start_time,
                end_time: session.end_time,
                capacity: session.capacity,
                waitlist_enabled: session.waitlist_enabled,
            };
        }
        BuilderOp::AddSection => sections_mut(model, "add_section")?.push(Section::blank()),
        BuilderOp::RemoveSection { index } => {
            remove_keeping_one(sections_mut(model, "remove_section")?, index, "section")?
        }
        BuilderOp::DuplicateSection { index } => {
            duplicate_after(sections_mut(model, "duplicate_section")?, index, "section", |s| {
                s.id = new_item_id()
            })?
        }
        BuilderOp::UpdateSection { index, section } => {
            let day = section.day.as_deref().map(parse_day).transpose()?;
            let sections = sections_mut(model, "update_section")?;
            let target = sections
                .get_mut(index)
                .ok_or(EditorError::IndexOutOfRange {
                    item: "section",
                    index,
                })?;
            *target = Section {
                id: target.id.clone(),
                day,
                capacity: section.capacity,
                start_time: section.start_time,
                end_time: section.end_time,
            };
        }
        BuilderOp::AddTimeBlock { day } => {
            let day = parse_day(&day)?;
            available_blocks_mut(model, day, "add_time_block")?.push(TimeBlock::empty());
        }
        BuilderOp::RemoveTimeBlock { day, index } => {
            let day = parse_day(&day)?;
            let blocks = available_blocks_mut(model, day, "remove_time_block")?;
            remove_keeping_one(blocks, index, "time block")?;
        }
        BuilderOp::DuplicateTimeBlock { day, index } => {
            let day = parse_day(&day)?;
            let blocks = available_blocks_mut(model, day, "duplicate_time_block")?;
            duplicate_after(blocks, index, "time block", |b| b.id = new_item_id())?;
        }
        BuilderOp::UpdateTimeBlock {
            day,
            index,
            start,
            end,
        } => {
            let day = parse_day(&day)?;
            let blocks = available_blocks_mut(model, day, "update_time_block")?;
            let block = blocks
                .get_mut(index)
                .ok_or(EditorError::IndexOutOfRange {
                    item: "time block",
                    index,
                })?;
            block.start = start;
            block.end = end;
        }
        BuilderOp::ToggleDayAvailable { day } => {
            let day = parse_day(&day)?;
            let ScheduleKind::ClassOngoing(class) = &mut model.schedule else {
                return Err(wrong_type("toggle_day_available", &model.schedule));
            };
            let entry = class.weekly.entry(day).or_default();
            entry.available = !entry.available;
            entry.blocks = if entry.available {
                vec![TimeBlock::empty()]
            } else {
                Vec::new()
            };
        }
        BuilderOp::SetWeeklyBlock { day, start, end } => {
            let day = parse_day(&day)?;
            let ScheduleKind::OngoingWeekly(weekly) = &mut model.schedule else {
                return Err(wrong_type("set_weekly_block", &model.schedule));
            };
            match weekly.weekly.entry(day) {
                Entry::Occupied(mut existing) => {
                    let block = existing.get_mut();
                    block.start = start;
                    block.end = end;
                }
                Entry::Vacant(slot) => {
                    slot.insert(TimeBlock::new(start, end));
                }
            }
        }
        BuilderOp::ClearWeeklyBlock { day } => {
            let day = parse_day(&day)?;
            let ScheduleKind::OngoingWeekly(weekly) = &mut model.schedule else {
                return Err(wrong_type("clear_weekly_block", &model.schedule));
            };
            weekly.weekly.remove(&day);
        }
        BuilderOp::SetOngoingWindow {
            start_date,
            end_date,
        } => {
            let ScheduleKind::OngoingWeekly(weekly) = &mut model.schedule else {
                return Err(wrong_type("set_ongoing_window", &model.schedule));
            };
            weekly.start_date = start_date.filter(|s| !s.trim().is_empty());
            weekly.end_date = end_date.filter(|s| !s.trim().is_empty());
        }
        BuilderOp::UpdateFixed { fixed } => {
            let ScheduleKind::Fixed(target) = &mut model.schedule else {
                return Err(wrong_type("update_fixed", &model.schedule));
            };
            *target = FixedSchedule {
                start_date: fixed.start_date,
                end_date: blank_to_none(fixed.end_date),
                start_time: blank_to_none(fixed.start_time),
                end_time: blank_to_none(fixed.end_time),
                all_day: fixed.all_day,
                repeat_rule: fixed.repeat_rule,
            };
        }
        BuilderOp::SwitchScheduleType { schedule_type } => {
            let schedule = ScheduleKind::blank(&schedule_type)
                .ok_or(EditorError::UnknownScheduleType(schedule_type))?;
            if !model.activity_kind.allows(&schedule) {
                return Err(EditorError::KindMismatch {
                    schedule: schedule.name(),
                    kind: model.activity_kind.as_str(),
                });
            }
            if schedule.name() != model.schedule.name() {
                model.schedule = schedule;
            }
        }
        BuilderOp::ToggleAgeBucket { bucket } => {
            let bucket: AgeBucket = bucket
                .parse()
                .map_err(|_| EditorError::UnknownAgeBucket(bucket))?;
            model.age_range.toggle(bucket);
        }
        BuilderOp::SetPricing { pricing } => model.pricing = pricing,
    }

    Ok(())
}

fn parse_day(raw: &str) -> Result<Day, EditorError> {
    raw.parse()
        .map_err(|_| EditorError::UnknownDay(raw.to_string()))
}

fn wrong_type(op: &'static str, schedule: &ScheduleKind) -> EditorError {
    EditorError::WrongScheduleType {
        op,
        schedule: schedule.name(),
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn sessions_mut<'a>(
    model: &'a mut ScheduleModel,
    op: &'static str,
) -> Result<&'a mut Vec<Session>, EditorError> {
    match &mut model.schedule {
        ScheduleKind::CampSessions(camp) => Ok(&mut camp.sessions),
        other => Err(wrong_type(op, other)),
    }
}

fn sections_mut<'a>(
    model: &'a mut ScheduleModel,
    op: &'static str,
) -> Result<&'a mut Vec<Section>, EditorError> {
    match &mut model.schedule {
        ScheduleKind::ClassSessions(class) => Ok(&mut class.sections),
        other => Err(wrong_type(op, other)),
    }
}

fn available_blocks_mut<'a>(
    model: &'a mut ScheduleModel,
    day: Day,
    op: &'static str,
) -> Result<&'a mut Vec<TimeBlock>, EditorError> {
    match &mut model.schedule {
        ScheduleKind::ClassOngoing(class) => match class.weekly.get_mut(&day) {
            Some(DayAvailability {
                available: true,
                blocks,
            }) => Ok(blocks),
            _ => Err(EditorError::DayUnavailable(day)),
        },
        other => Err(wrong_type(op, other)),
    }
}

/// Removing the last remaining item is a no-op.
fn remove_keeping_one<T>(
    items: &mut Vec<T>,
    index: usize,
    item: &'static str,
) -> Result<(), EditorError> {
    if index >= items.len() {
        return Err(EditorError::IndexOutOfRange { item, index });
    }
    if items.len() > 1 {
        items.remove(index);
    }
    Ok(())
}

fn duplicate_after<T: Clone>(
    items: &mut Vec<T>,
    index: usize,
    item: &'static str,
    reassign_id: impl FnOnce(&mut T),
) -> Result<(), EditorError> {
    let mut copy = items
        .get(index)
        .cloned()
        .ok_or(EditorError::IndexOutOfRange { item, index })?;
    reassign_id(&mut copy);
    items.insert(index + 1, copy);
    Ok(())
}

// ============================================================================
// Submit-time validation
// ============================================================================

/// Checks a model before it is submitted. Returns every problem found.
pub fn validate_for_submit(model: &ScheduleModel) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    if !model.activity_kind.allows(&model.schedule) {
        problems.push(format!(
            "schedule type '{}' is not allowed for a {}",
            model.schedule.name(),
            model.activity_kind.as_str()
        ));
    }

    match &model.schedule {
        ScheduleKind::Fixed(fixed) => validate_fixed(fixed, &mut problems),
        ScheduleKind::OngoingWeekly(weekly) => {
            check_date("startDate", weekly.start_date.as_deref(), &mut problems);
            check_date("endDate", weekly.end_date.as_deref(), &mut problems);
            if let (Some(start), Some(end)) = (
                weekly.start_date.as_deref().and_then(date_value),
                weekly.end_date.as_deref().and_then(date_value),
            ) {
                if end < start {
                    problems.push("endDate must not be before startDate".to_string());
                }
            }
            for (day, block) in &weekly.weekly {
                check_block(&format!("{} block", day), block, &mut problems);
            }
        }
        ScheduleKind::CampSessions(camp) => {
            for (i, session) in camp.sessions.iter().enumerate() {
                let label = format!("session {}", i + 1);
                check_date(&format!("{} startDate", label), Some(session.start_date.as_str()), &mut problems);
                check_date(&format!("{} endDate", label), Some(session.end_date.as_str()), &mut problems);
                check_time(&format!("{} startTime", label), Some(session.start_time.as_str()), &mut problems);
                check_time(&format!("{} endTime", label), Some(session.end_time.as_str()), &mut problems);
                if let (Some(start), Some(end)) =
                    (date_value(&session.start_date), date_value(&session.end_date))
                {
                    if end < start {
                        problems.push(format!("{} ends before it starts", label));
                    }
                }
            }
        }
        ScheduleKind::ClassOngoing(class) => {
            for (day, availability) in &class.weekly {
                if !availability.available && !availability.blocks.is_empty() {
                    problems.push(format!("{} is unavailable but has time blocks", day));
                }
                for block in &availability.blocks {
                    check_block(&format!("{} block", day), block, &mut problems);
                }
            }
        }
        ScheduleKind::ClassSessions(class) => {
            for (i, section) in class.sections.iter().enumerate() {
                let label = format!("section {}", i + 1);
                check_time(&format!("{} startTime", label), Some(section.start_time.as_str()), &mut problems);
                check_time(&format!("{} endTime", label), Some(section.end_time.as_str()), &mut problems);
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

fn validate_fixed(fixed: &FixedSchedule, problems: &mut Vec<String>) {
    if fixed.start_date.trim().is_empty() {
        problems.push("startDate is required".to_string());
    }
    check_date("startDate", Some(fixed.start_date.as_str()), problems);
    check_date("endDate", fixed.end_date.as_deref(), problems);

    if let (Some(start), Some(end)) = (
        date_value(&fixed.start_date),
        fixed.end_date.as_deref().and_then(date_value),
    ) {
        if end < start {
            problems.push("endDate must not be before startDate".to_string());
        }
    }

    if fixed.all_day {
        return;
    }

    check_time("startTime", fixed.start_time.as_deref(), problems);
    check_time("endTime", fixed.end_time.as_deref(), problems);

    let has_start = fixed.start_time.as_deref().is_some_and(|s| !s.trim().is_empty());
    let has_end = fixed.end_time.as_deref().is_some_and(|s| !s.trim().is_empty());
    if has_start != has_end {
        problems.push("startTime and endTime must be set together unless all day".to_string());
    }
}

fn check_date(field: &str, raw: Option<&str>, problems: &mut Vec<String>) {
    if let Some(raw) = raw {
        if !is_valid_date(raw) {
            problems.push(format!("{} '{}' is not a valid date (YYYY-MM-DD)", field, raw));
        }
    }
}

fn check_time(field: &str, raw: Option<&str>, problems: &mut Vec<String>) {
    if let Some(raw) = raw {
        if !is_valid_time(raw) {
            problems.push(format!("{} '{}' is not a valid time (HH:MM)", field, raw));
        }
    }
}

fn check_block(label: &str, block: &TimeBlock, problems: &mut Vec<String>) {
    check_time(&format!("{} start", label), Some(block.start.as_str()), problems);
    check_time(&format!("{} end", label), Some(block.end.as_str()), problems);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{
        ActivityKind, AgeBounds, CampSessionsSchedule, ClassOngoingSchedule, ClassSessionsSchedule,
    };

    fn camp_sessions(sessions: Vec<Session>) -> ScheduleEditor {
        ScheduleEditor::new(ScheduleModel {
            schedule: ScheduleKind::CampSessions(CampSessionsSchedule { sessions }),
            ..ScheduleModel::new_for(ActivityKind::Camp)
        })
    }

    fn class_editor() -> ScheduleEditor {
        ScheduleEditor::new(ScheduleModel::new_for(ActivityKind::Class))
    }

    fn blocks(model: &ScheduleModel, day: Day) -> Vec<TimeBlock> {
        match &model.schedule {
            ScheduleKind::ClassOngoing(class) => class.weekly[&day].blocks.clone(),
            other => panic!("expected class ongoing, got {}", other.name()),
        }
    }

    fn sessions(model: &ScheduleModel) -> Vec<Session> {
        match &model.schedule {
            ScheduleKind::CampSessions(camp) => camp.sessions.clone(),
            other => panic!("expected camp sessions, got {}", other.name()),
        }
    }

    #[test]
    fn removing_the_only_session_is_a_no_op() {
        let mut editor = camp_sessions(vec![Session::blank()]);
        for _ in 0..5 {
            let model = editor.remove_session(0).unwrap();
            assert_eq!(sessions(&model).len(), 1);
        }
    }

    #[test]
    fn remove_session_drops_the_indexed_one() {
        let mut editor = camp_sessions(vec![Session::blank()]);
        editor.add_session().unwrap();
        let second = sessions(editor.snapshot())[1].id.clone();
        let model = editor.remove_session(0).unwrap();
        assert_eq!(
            sessions(&model).iter().map(|s| s.id.clone()).collect::<Vec<_>>(),
            vec![second]
        );
    }

    #[test]
    fn duplicate_session_inserts_after_source_with_new_id() {
        let first = Session {
            start_date: "2025-07-07".to_string(),
            capacity: 15,
            ..Session::blank()
        };
        let last = Session::blank();
        let mut editor = camp_sessions(vec![first.clone(), last.clone()]);

        let model = editor.duplicate_session(0).unwrap();
        let list = sessions(&model);
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], first);
        assert_eq!(list[1].start_date, "2025-07-07");
        assert_eq!(list[1].capacity, 15);
        assert_ne!(list[1].id, first.id);
        assert_eq!(list[2], last);
    }

    #[test]
    fn duplicate_time_block_lands_at_next_index() {
        let mut editor = class_editor();
        editor.toggle_day_available(Day::Monday).unwrap();
        editor
            .apply(BuilderOp::UpdateTimeBlock {
                day: "monday".to_string(),
                index: 0,
                start: "09:00".to_string(),
                end: "10:00".to_string(),
            })
            .unwrap();
        editor.add_time_block(Day::Monday).unwrap();

        let model = editor.duplicate_time_block(Day::Monday, 0).unwrap();
        let list = blocks(&model, Day::Monday);
        assert_eq!(list.len(), 3);
        assert_eq!((list[1].start.as_str(), list[1].end.as_str()), ("09:00", "10:00"));
        assert_ne!(list[1].id, list[0].id);
        assert_eq!(list[2].start, "");
    }

    #[test]
    fn toggling_day_clears_and_seeds_blocks() {
        let mut editor = class_editor();
        let on = editor.toggle_day_available(Day::Friday).unwrap();
        let seeded = blocks(&on, Day::Friday);
        assert_eq!(seeded.len(), 1);
        assert!(seeded[0].start.is_empty() && seeded[0].end.is_empty());

        editor.add_time_block(Day::Friday).unwrap();
        let off = editor.toggle_day_available(Day::Friday).unwrap();
        assert!(blocks(&off, Day::Friday).is_empty());
    }

    #[test]
    fn last_time_block_of_available_day_is_kept() {
        let mut editor = class_editor();
        editor.toggle_day_available(Day::Monday).unwrap();
        let model = editor.remove_time_block(Day::Monday, 0).unwrap();
        assert_eq!(blocks(&model, Day::Monday).len(), 1);
    }

    #[test]
    fn rejected_ops_leave_state_untouched() {
        let mut editor = class_editor();
        let before = editor.snapshot().clone();

        let bad_day = editor.apply(BuilderOp::AddTimeBlock {
            day: "someday".to_string(),
        });
        assert_eq!(bad_day, Err(EditorError::UnknownDay("someday".to_string())));

        let unavailable = editor.add_time_block(Day::Sunday);
        assert_eq!(unavailable, Err(EditorError::DayUnavailable(Day::Sunday)));

        let wrong = editor.add_session();
        assert!(matches!(wrong, Err(EditorError::WrongScheduleType { .. })));

        assert_eq!(editor.snapshot(), &before);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut editor = ScheduleEditor::new(ScheduleModel {
            schedule: ScheduleKind::ClassSessions(ClassSessionsSchedule::default()),
            ..ScheduleModel::new_for(ActivityKind::Class)
        });
        assert_eq!(
            editor.duplicate_section(3),
            Err(EditorError::IndexOutOfRange {
                item: "section",
                index: 3
            })
        );
        assert_eq!(
            editor.remove_section(1),
            Err(EditorError::IndexOutOfRange {
                item: "section",
                index: 1
            })
        );
    }

    #[test]
    fn sections_add_duplicate_and_never_empty() {
        let mut editor = ScheduleEditor::new(ScheduleModel {
            schedule: ScheduleKind::ClassSessions(ClassSessionsSchedule::default()),
            ..ScheduleModel::new_for(ActivityKind::Class)
        });
        editor.add_section().unwrap();
        editor.duplicate_section(1).unwrap();
        editor.remove_section(0).unwrap();
        editor.remove_section(0).unwrap();
        let model = editor.remove_section(0).unwrap();
        let ScheduleKind::ClassSessions(class) = model.schedule else {
            panic!("expected sections");
        };
        assert_eq!(class.sections.len(), 1);
    }

    #[test]
    fn switching_type_respects_activity_kind() {
        let mut editor = ScheduleEditor::new(ScheduleModel::new_for(ActivityKind::Camp));
        let err = editor.apply(BuilderOp::SwitchScheduleType {
            schedule_type: "classOngoing".to_string(),
        });
        assert!(matches!(err, Err(EditorError::KindMismatch { .. })));

        let model = editor
            .apply(BuilderOp::SwitchScheduleType {
                schedule_type: "campSessions".to_string(),
            })
            .unwrap();
        assert_eq!(sessions(&model).len(), 1);
    }

    #[test]
    fn weekly_block_is_one_per_day() {
        let mut editor = ScheduleEditor::new(ScheduleModel::new_for(ActivityKind::Camp));
        editor
            .apply(BuilderOp::SwitchScheduleType {
                schedule_type: "ongoingWeekly".to_string(),
            })
            .unwrap();
        editor
            .apply(BuilderOp::SetWeeklyBlock {
                day: "tue".to_string(),
                start: "09:00".to_string(),
                end: "12:00".to_string(),
            })
            .unwrap();
        let model = editor
            .apply(BuilderOp::SetWeeklyBlock {
                day: "tuesday".to_string(),
                start: "13:00".to_string(),
                end: "15:00".to_string(),
            })
            .unwrap();
        let ScheduleKind::OngoingWeekly(weekly) = model.schedule else {
            panic!("expected ongoing weekly");
        };
        assert_eq!(weekly.weekly.len(), 1);
        assert_eq!(weekly.weekly[&Day::Tuesday].start, "13:00");
    }

    #[test]
    fn age_bucket_toggle_goes_through_editor() {
        let mut editor = ScheduleEditor::new(ScheduleModel::new_for(ActivityKind::Camp));
        editor
            .apply(BuilderOp::ToggleAgeBucket {
                bucket: "6-8".to_string(),
            })
            .unwrap();
        let model = editor
            .apply(BuilderOp::ToggleAgeBucket {
                bucket: "9-12".to_string(),
            })
            .unwrap();
        assert_eq!(
            model.age_range.bounds(),
            AgeBounds {
                min: Some(6),
                max: Some(12)
            }
        );
        assert!(matches!(
            editor.apply(BuilderOp::ToggleAgeBucket {
                bucket: "toddlers".to_string()
            }),
            Err(EditorError::UnknownAgeBucket(_))
        ));
    }

    #[test]
    fn builder_op_deserializes_from_tagged_json() {
        let op: BuilderOp =
            serde_json::from_str(r#"{"op":"duplicate_time_block","day":"monday","index":0}"#)
                .unwrap();
        assert!(matches!(op, BuilderOp::DuplicateTimeBlock { index: 0, .. }));
    }

    fn fixed_model(fixed: FixedSchedule) -> ScheduleModel {
        ScheduleModel {
            schedule: ScheduleKind::Fixed(fixed),
            ..ScheduleModel::new_for(ActivityKind::Camp)
        }
    }

    #[test]
    fn submit_rejects_end_date_before_start_date() {
        let model = fixed_model(FixedSchedule {
            start_date: "2025-06-10".to_string(),
            end_date: Some("2025-06-09".to_string()),
            all_day: true,
            ..Default::default()
        });
        let problems = validate_for_submit(&model).unwrap_err();
        assert!(problems.iter().any(|p| p.contains("endDate")));
    }

    #[test]
    fn submit_rejects_half_specified_times() {
        let model = fixed_model(FixedSchedule {
            start_date: "2025-06-10".to_string(),
            start_time: Some("09:00".to_string()),
            ..Default::default()
        });
        assert!(validate_for_submit(&model).is_err());

        let all_day = fixed_model(FixedSchedule {
            start_date: "2025-06-10".to_string(),
            start_time: Some("09:00".to_string()),
            all_day: true,
            ..Default::default()
        });
        assert!(validate_for_submit(&all_day).is_ok());
    }

    #[test]
    fn submit_accepts_complete_fixed_schedule() {
        let model = fixed_model(FixedSchedule {
            start_date: "2025-06-10".to_string(),
            end_date: Some("2025-06-10".to_string()),
            start_time: Some("09:00".to_string()),
            end_time: Some("12:00".to_string()),
            ..Default::default()
        });
        assert_eq!(validate_for_submit(&model), Ok(()));
    }

    #[test]
    fn submit_rejects_illegal_kind_pairing() {
        let model = ScheduleModel {
            schedule: ScheduleKind::ClassOngoing(ClassOngoingSchedule::default()),
            ..ScheduleModel::new_for(ActivityKind::Camp)
        };
        assert!(validate_for_submit(&model).is_err());
    }
}
