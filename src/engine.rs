use crate::conflict::detect_conflicts;
use crate::error::{ScheduleError, ScheduleResult};
use crate::faculty::{FacultyAssignment, FacultyChoices};
use crate::ids::{AcademicYear, ClassId, TeacherId};
use crate::period::Period;
use crate::persistence::{ScheduleStore, TimetableSnapshot};
use crate::schedule::{DaySchedule, ScheduleKey, TeacherAgenda, WeeklyAgenda};
use crate::school_week::SchoolWeek;
use crate::validation::validate_periods;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A full candidate period list for one day document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub key: ScheduleKey,
    pub periods: Vec<Period>,
    /// When set, the save only goes through if the stored document still has
    /// this version (0 for a document never saved).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

impl SaveRequest {
    pub fn new(key: ScheduleKey, periods: Vec<Period>) -> Self {
        Self {
            key,
            periods,
            expected_version: None,
        }
    }

    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub assignments_added: usize,
    pub schedules_saved: usize,
}

/// Validates and persists human-authored timetables.
pub struct TimetableEngine<S> {
    store: S,
    school_week: SchoolWeek,
}

impl<S: ScheduleStore> TimetableEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_school_week(store, SchoolWeek::default())
    }

    pub fn with_school_week(store: S, school_week: SchoolWeek) -> Self {
        Self { store, school_week }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn school_week(&self) -> &SchoolWeek {
        &self.school_week
    }

    fn ensure_year(year: &AcademicYear) -> ScheduleResult<()> {
        if year.is_blank() {
            return Err(ScheduleError::invalid_input("academic year must not be blank"));
        }
        Ok(())
    }

    fn ensure_key(key: &ScheduleKey) -> ScheduleResult<()> {
        Self::ensure_year(&key.academic_year)?;
        if key.class_id.is_blank() {
            return Err(ScheduleError::invalid_input("class id must not be blank"));
        }
        Ok(())
    }

    /// The stored document, or an empty version-0 document when nothing has
    /// been saved for `key` yet.
    pub fn get_schedule(&self, key: &ScheduleKey) -> ScheduleResult<DaySchedule> {
        Self::ensure_key(key)?;
        Ok(self
            .store
            .load_day(key)?
            .unwrap_or_else(|| DaySchedule::empty(key)))
    }

    /// Replaces the stored document. The period validator, run against the
    /// year's faculty matrix, and the teacher conflict check form the store's
    /// gate, so both see the state the write lands on. On any error the
    /// previous document is left as it was.
    pub fn save_schedule(&self, request: SaveRequest) -> ScheduleResult<DaySchedule> {
        let SaveRequest {
            key,
            periods,
            expected_version,
        } = request;
        Self::ensure_key(&key)?;
        self.school_week.ensure_teaching_day(key.weekday)?;

        let gate_periods = periods.clone();
        let result = self
            .store
            .replace_day(&key, periods, expected_version, |matrix, others| {
                validate_periods(&key.class_id, &gate_periods, matrix)?;
                detect_conflicts(&key, &gate_periods, others)?;
                Ok(())
            });

        match &result {
            Ok(saved) => info!(
                %key,
                version = saved.version,
                periods = saved.periods.len(),
                "saved day schedule"
            ),
            Err(ScheduleError::Validation(err)) => warn!(
                %key,
                check = %err.kind,
                violations = err.violations.len(),
                "rejected day schedule"
            ),
            Err(ScheduleError::Conflict(conflict)) => warn!(
                %key,
                teacher = %conflict.teacher_id,
                other_class = %conflict.conflicting_class_id,
                "rejected day schedule: teacher double-booked"
            ),
            Err(err) => warn!(%key, error = %err, "day schedule not saved"),
        }
        result
    }

    pub fn weekly_agenda(
        &self,
        class_id: &ClassId,
        year: &AcademicYear,
    ) -> ScheduleResult<WeeklyAgenda> {
        Self::ensure_year(year)?;
        let schedules = self.store.class_schedules(class_id, year)?;
        Ok(WeeklyAgenda::from_schedules(
            class_id.clone(),
            year.clone(),
            &schedules,
        ))
    }

    pub fn teacher_agenda(
        &self,
        teacher_id: &TeacherId,
        year: &AcademicYear,
    ) -> ScheduleResult<TeacherAgenda> {
        Self::ensure_year(year)?;
        let schedules = self.store.year_schedules(year)?;
        Ok(TeacherAgenda::from_schedules(
            teacher_id.clone(),
            year.clone(),
            &schedules,
        ))
    }

    pub fn class_choices(
        &self,
        class_id: &ClassId,
        year: &AcademicYear,
    ) -> ScheduleResult<FacultyChoices> {
        Self::ensure_year(year)?;
        Ok(self.store.faculty_matrix(year)?.choices_for_class(class_id))
    }

    /// Seeds one row of the faculty matrix. Returns `false` if it was
    /// already present.
    pub fn record_assignment(
        &self,
        year: &AcademicYear,
        assignment: &FacultyAssignment,
    ) -> ScheduleResult<bool> {
        Self::ensure_year(year)?;
        if assignment.has_blank_field() {
            return Err(ScheduleError::invalid_input(
                "assignment needs a class, a subject and a teacher",
            ));
        }
        let added = self.store.record_assignment(year, assignment)?;
        if added {
            info!(
                year = %year,
                class = %assignment.class_id,
                subject = %assignment.subject_id,
                teacher = %assignment.teacher_id,
                "recorded faculty assignment"
            );
        }
        Ok(added)
    }

    /// Removes one row of the faculty matrix. Refused while a stored class
    /// period still relies on it; the store checks and deletes under one lock.
    pub fn remove_assignment(
        &self,
        year: &AcademicYear,
        assignment: &FacultyAssignment,
    ) -> ScheduleResult<bool> {
        Self::ensure_year(year)?;
        let removed = self.store.remove_assignment(year, assignment)?;
        if removed {
            info!(
                year = %year,
                class = %assignment.class_id,
                subject = %assignment.subject_id,
                teacher = %assignment.teacher_id,
                "removed faculty assignment"
            );
        }
        Ok(removed)
    }

    pub fn export_snapshot(&self, year: &AcademicYear) -> ScheduleResult<TimetableSnapshot> {
        Self::ensure_year(year)?;
        Ok(TimetableSnapshot {
            academic_year: year.clone(),
            assignments: self.store.faculty_matrix(year)?.sorted_entries(),
            schedules: self.store.year_schedules(year)?,
        })
    }

    /// Seeds the snapshot's assignments, then saves each schedule through
    /// [`TimetableEngine::save_schedule`]. Stops at the first schedule that is
    /// rejected; schedules saved before it stay saved.
    pub fn import_snapshot(&self, snapshot: TimetableSnapshot) -> ScheduleResult<ImportSummary> {
        let year = snapshot.academic_year;
        Self::ensure_year(&year)?;
        if let Some(stray) = snapshot
            .schedules
            .iter()
            .find(|schedule| schedule.academic_year != year)
        {
            return Err(ScheduleError::invalid_input(format!(
                "snapshot for {year} contains a schedule for {}",
                stray.academic_year
            )));
        }

        let mut summary = ImportSummary::default();
        for assignment in &snapshot.assignments {
            if self.record_assignment(&year, assignment)? {
                summary.assignments_added += 1;
            }
        }
        for schedule in snapshot.schedules {
            let key = schedule.key();
            self.save_schedule(SaveRequest::new(key, schedule.periods))?;
            summary.schedules_saved += 1;
        }
        Ok(summary)
    }
}
