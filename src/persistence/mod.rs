use crate::error::{ScheduleError, ScheduleResult};
use crate::faculty::{FacultyAssignment, FacultyAssignmentMatrix};
use crate::ids::{AcademicYear, ClassId};
use crate::period::Period;
use crate::schedule::{self, DaySchedule, ScheduleKey};
use chrono::Weekday;
use serde_json::Error as SerdeJsonError;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Durable home of day documents and of the faculty assignment rows they are
/// validated against.
///
/// Implementations must make [`ScheduleStore::replace_day`] atomic: the faculty
/// matrix and competitor snapshot handed to `gate` and the write that follows
/// happen under one lock or transaction, and nothing is written when `gate`
/// fails. [`ScheduleStore::remove_assignment`] holds the same lock across its
/// in-use check and the delete.
pub trait ScheduleStore: Send + Sync {
    fn load_day(&self, key: &ScheduleKey) -> PersistenceResult<Option<DaySchedule>>;

    /// Every class's document for one weekday of one year.
    fn day_schedules(
        &self,
        weekday: Weekday,
        year: &AcademicYear,
    ) -> PersistenceResult<Vec<DaySchedule>>;

    /// Every weekday document of one class.
    fn class_schedules(
        &self,
        class_id: &ClassId,
        year: &AcademicYear,
    ) -> PersistenceResult<Vec<DaySchedule>>;

    fn year_schedules(&self, year: &AcademicYear) -> PersistenceResult<Vec<DaySchedule>>;

    fn faculty_matrix(&self, year: &AcademicYear) -> PersistenceResult<FacultyAssignmentMatrix>;

    /// Returns `false` when the assignment was already recorded.
    fn record_assignment(
        &self,
        year: &AcademicYear,
        assignment: &FacultyAssignment,
    ) -> PersistenceResult<bool>;

    /// Returns `false` when there was nothing to remove. Fails with
    /// `InvalidInput` while a stored period of the class still uses the
    /// subject and teacher pair.
    fn remove_assignment(
        &self,
        year: &AcademicYear,
        assignment: &FacultyAssignment,
    ) -> ScheduleResult<bool>;

    /// Swaps the document for `key` wholesale.
    ///
    /// `gate` receives the year's faculty matrix and the documents of every
    /// *other* class for the same weekday and year. When `expected_version` is given it must equal the
    /// stored version (0 for a key never saved).
    fn replace_day<F>(
        &self,
        key: &ScheduleKey,
        periods: Vec<Period>,
        expected_version: Option<u64>,
        gate: F,
    ) -> ScheduleResult<DaySchedule>
    where
        F: FnOnce(&FacultyAssignmentMatrix, &[DaySchedule]) -> ScheduleResult<()>;
}

/// Outcome of [`prepare_revision`].
pub(crate) struct Revision {
    pub document: DaySchedule,
    /// `false` when the stored document is already identical.
    pub changed: bool,
}

/// Shared body of `replace_day` once a backend holds its lock: version check,
/// gate, then the next revision of the document.
pub(crate) fn prepare_revision<F>(
    key: &ScheduleKey,
    previous: Option<&DaySchedule>,
    periods: Vec<Period>,
    expected_version: Option<u64>,
    matrix: &FacultyAssignmentMatrix,
    competitors: &[DaySchedule],
    gate: F,
) -> ScheduleResult<Revision>
where
    F: FnOnce(&FacultyAssignmentMatrix, &[DaySchedule]) -> ScheduleResult<()>,
{
    let found = previous.map(|doc| doc.version).unwrap_or(0);
    if let Some(expected) = expected_version
        && expected != found
    {
        return Err(ScheduleError::StaleVersion { expected, found });
    }
    gate(matrix, competitors)?;
    let document = schedule::next_revision(key, previous, periods);
    let changed = previous.is_none_or(|doc| doc.version != document.version);
    Ok(Revision { document, changed })
}

/// Fails when any period of `schedules` still teaches the assignment's subject
/// with its teacher. `schedules` are the documents of the assignment's class.
pub(crate) fn ensure_assignment_unused(
    assignment: &FacultyAssignment,
    schedules: &[DaySchedule],
) -> ScheduleResult<()> {
    for schedule in schedules {
        let in_use = schedule.periods.iter().find(|p| {
            p.assigned_teacher() == Some(&assignment.teacher_id)
                && p.subject_id.as_ref() == Some(&assignment.subject_id)
        });
        if let Some(period) = in_use {
            return Err(ScheduleError::invalid_input(format!(
                "assignment is used by class {} on {} (period {})",
                schedule.class_id, schedule.weekday, period.period_number
            )));
        }
    }
    Ok(())
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    TimetableSnapshot, export_class_agenda_csv, load_snapshot_from_json, save_snapshot_to_json,
};
pub use memory::MemoryScheduleStore;
