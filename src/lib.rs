pub mod config;
pub mod conflict;
pub mod editing;
pub mod engine;
pub mod error;
pub mod faculty;
pub mod ids;
pub mod period;
pub mod persistence;
pub mod schedule;
pub mod school_week;
pub mod validation;

#[cfg(feature = "http_api")]
pub mod http_api;

pub use config::EngineConfig;
pub use conflict::{ConflictError, TeacherTimeline, detect_conflicts};
pub use editing::{EditDefaults, EditError, EditingSession, RowState};
pub use engine::{ImportSummary, SaveRequest, TimetableEngine};
pub use error::{ScheduleError, ScheduleResult};
pub use faculty::{FacultyAssignment, FacultyAssignmentMatrix, FacultyChoices};
pub use ids::{AcademicYear, ClassId, SubjectId, TeacherId};
pub use period::{Period, PeriodType};
pub use persistence::{MemoryScheduleStore, PersistenceError, ScheduleStore, TimetableSnapshot};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteScheduleStore;
pub use schedule::{DaySchedule, ScheduleKey, TeacherAgenda, WeeklyAgenda};
pub use school_week::SchoolWeek;
pub use validation::{ValidationError, ViolationKind, validate_periods};
