//! Row-level edit/lock state for one editing session of a (class, day) pair.
//!
//! Rows loaded from the store start `Locked`; rows appended during the session
//! start `Editing`. Nothing here is persisted on its own: [`EditingSession::save`]
//! always submits every row, whatever its state, as one candidate list.

use crate::engine::{SaveRequest, TimetableEngine};
use crate::error::ScheduleError;
use crate::faculty::FacultyChoices;
use crate::ids::{SubjectId, TeacherId};
use crate::period::{Period, PeriodType};
use crate::persistence::ScheduleStore;
use crate::schedule::{DaySchedule, ScheduleKey};
use chrono::{Duration, NaiveTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Read-only; fields cannot change until the row is unlocked.
    Locked,
    Editing,
}

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("row {0} does not exist")]
    NoSuchRow(usize),
    #[error("row {0} is locked; unlock it before editing")]
    RowLocked(usize),
    #[error("{0}")]
    NotOffered(String),
    #[error("row {row} is a {period_type} period and takes no subject or teacher")]
    NotApplicable { row: usize, period_type: PeriodType },
    #[error("row {0} was added in this session and has no saved values to return to")]
    NothingToDiscard(usize),
    #[error(transparent)]
    Save(#[from] ScheduleError),
}

/// Suggested times for newly appended rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditDefaults {
    pub day_start: NaiveTime,
    pub period_length: Duration,
}

impl EditDefaults {
    pub fn new(day_start: NaiveTime, period_minutes: u32) -> Self {
        Self {
            day_start,
            period_length: Duration::minutes(i64::from(period_minutes)),
        }
    }
}

impl Default for EditDefaults {
    fn default() -> Self {
        Self::new(NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN), 45)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRow {
    period: Period,
    state: RowState,
    /// Values as loaded from the store; `None` for rows appended this session.
    persisted: Option<Period>,
}

impl EditRow {
    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == RowState::Locked
    }

    pub fn is_new(&self) -> bool {
        self.persisted.is_none()
    }

    pub fn is_modified(&self) -> bool {
        self.persisted.as_ref() != Some(&self.period)
    }
}

pub struct EditingSession {
    key: ScheduleKey,
    base_version: u64,
    loaded: Vec<Period>,
    rows: Vec<EditRow>,
    choices: FacultyChoices,
    defaults: EditDefaults,
}

impl EditingSession {
    /// Loads the stored document for `key`; every row starts locked.
    pub fn open<S: ScheduleStore>(
        engine: &TimetableEngine<S>,
        key: ScheduleKey,
    ) -> Result<Self, ScheduleError> {
        let schedule = engine.get_schedule(&key)?;
        let choices = engine.class_choices(&key.class_id, &key.academic_year)?;
        Ok(Self::from_schedule(schedule, choices))
    }

    pub fn from_schedule(schedule: DaySchedule, choices: FacultyChoices) -> Self {
        let mut session = Self {
            key: schedule.key(),
            base_version: 0,
            loaded: Vec::new(),
            rows: Vec::new(),
            choices,
            defaults: EditDefaults::default(),
        };
        session.reset_to(schedule);
        session
    }

    pub fn with_defaults(mut self, defaults: EditDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    fn reset_to(&mut self, schedule: DaySchedule) {
        self.base_version = schedule.version;
        self.rows = schedule
            .periods
            .iter()
            .map(|period| EditRow {
                period: period.clone(),
                state: RowState::Locked,
                persisted: Some(period.clone()),
            })
            .collect();
        self.loaded = schedule.periods;
    }

    pub fn key(&self) -> &ScheduleKey {
        &self.key
    }

    /// Version of the document this session was loaded from.
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn rows(&self) -> &[EditRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&EditRow> {
        self.rows.get(index)
    }

    pub fn choices(&self) -> &FacultyChoices {
        &self.choices
    }

    pub fn candidate_periods(&self) -> Vec<Period> {
        self.rows.iter().map(|row| row.period.clone()).collect()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.rows.len() != self.loaded.len()
            || self
                .rows
                .iter()
                .zip(&self.loaded)
                .any(|(row, loaded)| &row.period != loaded)
    }

    /// Appends an instructional row in the `Editing` state, numbered after the
    /// last row and starting where the latest row ends. The end time stops at
    /// 23:59 rather than wrapping past midnight.
    pub fn append_row(&mut self) -> usize {
        let period_number = self
            .rows
            .iter()
            .map(|row| row.period.period_number)
            .max()
            .unwrap_or(0)
            + 1;
        let start_time = self
            .rows
            .iter()
            .map(|row| row.period.end_time)
            .max()
            .unwrap_or(self.defaults.day_start);
        let end_time = match start_time.overflowing_add_signed(self.defaults.period_length) {
            (end, 0) => end,
            _ => NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(start_time),
        };
        self.rows.push(EditRow {
            period: Period {
                period_number,
                start_time,
                end_time,
                period_type: PeriodType::Class,
                subject_id: None,
                teacher_id: None,
                room: None,
            },
            state: RowState::Editing,
            persisted: None,
        });
        self.rows.len() - 1
    }

    fn row_mut(&mut self, index: usize) -> Result<&mut EditRow, EditError> {
        self.rows.get_mut(index).ok_or(EditError::NoSuchRow(index))
    }

    fn editable_row(&mut self, index: usize) -> Result<&mut EditRow, EditError> {
        let row = self.row_mut(index)?;
        if row.is_locked() {
            return Err(EditError::RowLocked(index));
        }
        Ok(row)
    }

    pub fn unlock_row(&mut self, index: usize) -> Result<(), EditError> {
        self.row_mut(index)?.state = RowState::Editing;
        Ok(())
    }

    /// "Done editing" without saving. A loaded row drops its unsaved edits and
    /// shows the stored values again. A row appended in this session has no
    /// stored values, so it keeps what was typed and stays in the candidate
    /// list until saved or deleted.
    pub fn lock_row(&mut self, index: usize) -> Result<(), EditError> {
        let row = self.row_mut(index)?;
        if let Some(persisted) = &row.persisted {
            row.period = persisted.clone();
        }
        row.state = RowState::Locked;
        Ok(())
    }

    /// Same as [`EditingSession::lock_row`] for a loaded row, but refuses rows
    /// appended in this session.
    pub fn discard_row_edits(&mut self, index: usize) -> Result<(), EditError> {
        let row = self.row_mut(index)?;
        let Some(persisted) = row.persisted.clone() else {
            return Err(EditError::NothingToDiscard(index));
        };
        row.period = persisted;
        row.state = RowState::Locked;
        Ok(())
    }

    /// Allowed in either state.
    pub fn delete_row(&mut self, index: usize) -> Result<Period, EditError> {
        if index >= self.rows.len() {
            return Err(EditError::NoSuchRow(index));
        }
        Ok(self.rows.remove(index).period)
    }

    pub fn set_times(
        &mut self,
        index: usize,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<(), EditError> {
        let row = self.editable_row(index)?;
        row.period.start_time = start_time;
        row.period.end_time = end_time;
        Ok(())
    }

    pub fn set_period_number(&mut self, index: usize, period_number: u32) -> Result<(), EditError> {
        self.editable_row(index)?.period.period_number = period_number;
        Ok(())
    }

    /// Switching away from `Class` clears the subject and teacher.
    pub fn set_period_type(&mut self, index: usize, period_type: PeriodType) -> Result<(), EditError> {
        let row = self.editable_row(index)?;
        row.period.period_type = period_type;
        if !period_type.is_instructional() {
            row.period.subject_id = None;
            row.period.teacher_id = None;
        }
        Ok(())
    }

    /// Only subjects the class is offered may be chosen. A teacher who is not
    /// assigned to the new subject is cleared.
    pub fn set_subject(&mut self, index: usize, subject_id: SubjectId) -> Result<(), EditError> {
        if !self.choices.offers_subject(&subject_id) {
            return Err(EditError::NotOffered(format!(
                "subject {subject_id} is not offered to class {}",
                self.key.class_id
            )));
        }
        let keep_teacher = {
            let row = self.editable_row(index)?;
            if !row.period.period_type.is_instructional() {
                return Err(EditError::NotApplicable {
                    row: index,
                    period_type: row.period.period_type,
                });
            }
            row.period.teacher_id.clone()
        }
        .filter(|teacher| self.choices.allows(&subject_id, teacher));
        let row = self.editable_row(index)?;
        row.period.subject_id = Some(subject_id);
        row.period.teacher_id = keep_teacher;
        Ok(())
    }

    /// Only teachers assigned to the row's subject may be chosen.
    pub fn set_teacher(&mut self, index: usize, teacher_id: TeacherId) -> Result<(), EditError> {
        let subject = {
            let row = self.editable_row(index)?;
            if !row.period.period_type.is_instructional() {
                return Err(EditError::NotApplicable {
                    row: index,
                    period_type: row.period.period_type,
                });
            }
            row.period.subject_id.clone()
        };
        let Some(subject) = subject else {
            return Err(EditError::NotOffered(format!(
                "row {index} needs a subject before a teacher"
            )));
        };
        if !self.choices.allows(&subject, &teacher_id) {
            return Err(EditError::NotOffered(format!(
                "teacher {teacher_id} is not assigned to {subject} for class {}",
                self.key.class_id
            )));
        }
        self.editable_row(index)?.period.teacher_id = Some(teacher_id);
        Ok(())
    }

    pub fn set_room(&mut self, index: usize, room: Option<String>) -> Result<(), EditError> {
        self.editable_row(index)?.period.room = room.filter(|r| !r.trim().is_empty());
        Ok(())
    }

    /// Submits every row as the new day document. On success all rows are
    /// reloaded from the store in the `Locked` state; on failure the session
    /// is left exactly as it was.
    pub fn save<S: ScheduleStore>(
        &mut self,
        engine: &TimetableEngine<S>,
    ) -> Result<DaySchedule, EditError> {
        let request = SaveRequest::new(self.key.clone(), self.candidate_periods())
            .expecting_version(self.base_version);
        let saved = engine.save_schedule(request)?;
        let refreshed = engine.get_schedule(&self.key)?;
        self.reset_to(refreshed);
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faculty::{FacultyAssignment, FacultyAssignmentMatrix};
    use chrono::Weekday;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn session_with_one_saved_row() -> EditingSession {
        let key = ScheduleKey::new("5", Weekday::Mon, "2025-2026");
        let mut schedule = DaySchedule::empty(&key);
        schedule.version = 3;
        schedule.periods = vec![Period::class(1, t(8, 0), t(8, 45), "Math", "T1")];
        let matrix: FacultyAssignmentMatrix = [
            FacultyAssignment::new("5", "Math", "T1"),
            FacultyAssignment::new("5", "English", "T2"),
        ]
        .into_iter()
        .collect();
        EditingSession::from_schedule(schedule, matrix.choices_for_class(&key.class_id))
    }

    #[test]
    fn appended_row_follows_last_period() {
        let mut session = session_with_one_saved_row();
        let idx = session.append_row();
        let row = session.row(idx).unwrap();
        assert_eq!(row.state(), RowState::Editing);
        assert!(row.is_new());
        assert_eq!(row.period().period_number, 2);
        assert_eq!(row.period().start_time, t(8, 45));
        assert_eq!(row.period().end_time, t(9, 30));
    }

    #[test]
    fn appended_row_stops_at_the_end_of_the_day() {
        let key = ScheduleKey::new("5", Weekday::Tue, "2025-2026");
        let choices = FacultyAssignmentMatrix::new().choices_for_class(&key.class_id);
        let mut session = EditingSession::from_schedule(DaySchedule::empty(&key), choices)
            .with_defaults(EditDefaults::new(t(23, 30), 45));
        let idx = session.append_row();
        let period = session.row(idx).unwrap().period();
        assert_eq!(period.start_time, t(23, 30));
        assert_eq!(period.end_time, t(23, 59));
    }

    #[test]
    fn locking_drops_edits_of_a_loaded_row_only() {
        let mut session = session_with_one_saved_row();
        session.unlock_row(0).unwrap();
        session.set_room(0, Some("12".into())).unwrap();
        session.lock_row(0).unwrap();
        assert_eq!(session.row(0).unwrap().period().room, None);

        let idx = session.append_row();
        session.set_subject(idx, SubjectId::new("English")).unwrap();
        session.lock_row(idx).unwrap();
        let appended = session.row(idx).unwrap();
        assert!(appended.is_locked());
        assert_eq!(appended.period().subject_id, Some(SubjectId::new("English")));
    }

    #[test]
    fn subject_change_drops_unassigned_teacher() {
        let mut session = session_with_one_saved_row();
        session.unlock_row(0).unwrap();
        session.set_subject(0, SubjectId::new("English")).unwrap();
        let period = session.row(0).unwrap().period();
        assert_eq!(period.subject_id, Some(SubjectId::new("English")));
        assert_eq!(period.teacher_id, None);
    }

    #[test]
    fn break_rows_take_no_subject() {
        let mut session = session_with_one_saved_row();
        let idx = session.append_row();
        session.set_period_type(idx, PeriodType::Break).unwrap();
        let err = session.set_subject(idx, SubjectId::new("Math")).unwrap_err();
        assert!(matches!(err, EditError::NotApplicable { .. }));
    }
}
