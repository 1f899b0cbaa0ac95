use super::{
    PersistenceError, PersistenceResult, ScheduleStore, ensure_assignment_unused, prepare_revision,
};
use crate::error::ScheduleResult;
use crate::faculty::{FacultyAssignment, FacultyAssignmentMatrix};
use crate::ids::{AcademicYear, ClassId};
use crate::period::Period;
use crate::schedule::{DaySchedule, ScheduleKey};
use crate::school_week::{weekday_from_index, weekday_index};
use chrono::Weekday;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

const SELECT_SCHEDULE: &str =
    "SELECT class_id, weekday, academic_year, version, periods_json FROM day_schedules";

type ScheduleRow = (String, u8, String, i64, String);

pub struct SqliteScheduleStore {
    connection: Mutex<Connection>,
}

impl SqliteScheduleStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> PersistenceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> PersistenceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS day_schedules (
                class_id TEXT NOT NULL,
                weekday INTEGER NOT NULL CHECK (weekday BETWEEN 0 AND 6),
                academic_year TEXT NOT NULL,
                version INTEGER NOT NULL,
                periods_json TEXT NOT NULL,
                PRIMARY KEY (class_id, weekday, academic_year)
            );
            CREATE INDEX IF NOT EXISTS day_schedules_by_day
                ON day_schedules (academic_year, weekday);
            CREATE TABLE IF NOT EXISTS faculty_assignments (
                academic_year TEXT NOT NULL,
                class_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                teacher_id TEXT NOT NULL,
                PRIMARY KEY (academic_year, class_id, subject_id, teacher_id)
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRow> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn decode(row: ScheduleRow) -> PersistenceResult<DaySchedule> {
        let (class_id, weekday, academic_year, version, periods_json) = row;
        let weekday = weekday_from_index(weekday).ok_or_else(|| {
            PersistenceError::InvalidData(format!("stored weekday index {weekday} out of range"))
        })?;
        let version = u64::try_from(version).map_err(|_| {
            PersistenceError::InvalidData(format!("stored version {version} is negative"))
        })?;
        let periods: Vec<Period> = serde_json::from_str(&periods_json)?;
        Ok(DaySchedule {
            class_id: ClassId::new(class_id),
            weekday,
            academic_year: AcademicYear::new(academic_year),
            version,
            periods,
        })
    }

    fn query_schedules<P: rusqlite::Params>(
        connection: &Connection,
        filter: &str,
        params: P,
    ) -> PersistenceResult<Vec<DaySchedule>> {
        let sql = format!("{SELECT_SCHEDULE} WHERE {filter} ORDER BY class_id ASC, weekday ASC");
        let mut stmt = connection.prepare(&sql)?;
        let rows = stmt.query_map(params, Self::read_row)?;
        let mut schedules = Vec::new();
        for row in rows {
            schedules.push(Self::decode(row?)?);
        }
        Ok(schedules)
    }

    fn load_with(
        connection: &Connection,
        key: &ScheduleKey,
    ) -> PersistenceResult<Option<DaySchedule>> {
        let sql = format!("{SELECT_SCHEDULE} WHERE class_id = ?1 AND weekday = ?2 AND academic_year = ?3");
        let row: Option<ScheduleRow> = connection
            .query_row(
                &sql,
                params![
                    key.class_id.as_str(),
                    weekday_index(key.weekday),
                    key.academic_year.as_str()
                ],
                Self::read_row,
            )
            .optional()?;
        row.map(Self::decode).transpose()
    }

    fn load_matrix(
        connection: &Connection,
        year: &AcademicYear,
    ) -> PersistenceResult<FacultyAssignmentMatrix> {
        let mut stmt = connection.prepare(
            "SELECT class_id, subject_id, teacher_id FROM faculty_assignments WHERE academic_year = ?1",
        )?;
        let rows = stmt.query_map(params![year.as_str()], |row| {
            Ok(FacultyAssignment::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut matrix = FacultyAssignmentMatrix::new();
        for entry in rows {
            matrix.insert(entry?);
        }
        Ok(matrix)
    }

    fn write_schedule(connection: &Connection, schedule: &DaySchedule) -> PersistenceResult<()> {
        let json = serde_json::to_string(&schedule.periods)?;
        let version = i64::try_from(schedule.version).map_err(|_| {
            PersistenceError::InvalidData(format!("version {} does not fit", schedule.version))
        })?;
        connection.execute(
            "INSERT INTO day_schedules (class_id, weekday, academic_year, version, periods_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (class_id, weekday, academic_year)
             DO UPDATE SET version = excluded.version, periods_json = excluded.periods_json",
            params![
                schedule.class_id.as_str(),
                weekday_index(schedule.weekday),
                schedule.academic_year.as_str(),
                version,
                json
            ],
        )?;
        Ok(())
    }
}

impl ScheduleStore for SqliteScheduleStore {
    fn load_day(&self, key: &ScheduleKey) -> PersistenceResult<Option<DaySchedule>> {
        let conn = self.connection.lock();
        Self::load_with(&conn, key)
    }

    fn day_schedules(
        &self,
        weekday: Weekday,
        year: &AcademicYear,
    ) -> PersistenceResult<Vec<DaySchedule>> {
        let conn = self.connection.lock();
        Self::query_schedules(
            &conn,
            "academic_year = ?1 AND weekday = ?2",
            params![year.as_str(), weekday_index(weekday)],
        )
    }

    fn class_schedules(
        &self,
        class_id: &ClassId,
        year: &AcademicYear,
    ) -> PersistenceResult<Vec<DaySchedule>> {
        let conn = self.connection.lock();
        Self::query_schedules(
            &conn,
            "academic_year = ?1 AND class_id = ?2",
            params![year.as_str(), class_id.as_str()],
        )
    }

    fn year_schedules(&self, year: &AcademicYear) -> PersistenceResult<Vec<DaySchedule>> {
        let conn = self.connection.lock();
        Self::query_schedules(&conn, "academic_year = ?1", params![year.as_str()])
    }

    fn faculty_matrix(&self, year: &AcademicYear) -> PersistenceResult<FacultyAssignmentMatrix> {
        let conn = self.connection.lock();
        Self::load_matrix(&conn, year)
    }

    fn record_assignment(
        &self,
        year: &AcademicYear,
        assignment: &FacultyAssignment,
    ) -> PersistenceResult<bool> {
        let conn = self.connection.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO faculty_assignments (academic_year, class_id, subject_id, teacher_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                year.as_str(),
                assignment.class_id.as_str(),
                assignment.subject_id.as_str(),
                assignment.teacher_id.as_str()
            ],
        )?;
        Ok(inserted > 0)
    }

    fn remove_assignment(
        &self,
        year: &AcademicYear,
        assignment: &FacultyAssignment,
    ) -> ScheduleResult<bool> {
        let mut conn = self.connection.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(PersistenceError::from)?;
        let class_days = Self::query_schedules(
            &tx,
            "academic_year = ?1 AND class_id = ?2",
            params![year.as_str(), assignment.class_id.as_str()],
        )?;
        ensure_assignment_unused(assignment, &class_days)?;
        let removed = tx
            .execute(
                "DELETE FROM faculty_assignments
                 WHERE academic_year = ?1 AND class_id = ?2 AND subject_id = ?3 AND teacher_id = ?4",
                params![
                    year.as_str(),
                    assignment.class_id.as_str(),
                    assignment.subject_id.as_str(),
                    assignment.teacher_id.as_str()
                ],
            )
            .map_err(PersistenceError::from)?;
        tx.commit().map_err(PersistenceError::from)?;
        Ok(removed > 0)
    }

    fn replace_day<F>(
        &self,
        key: &ScheduleKey,
        periods: Vec<Period>,
        expected_version: Option<u64>,
        gate: F,
    ) -> ScheduleResult<DaySchedule>
    where
        F: FnOnce(&FacultyAssignmentMatrix, &[DaySchedule]) -> ScheduleResult<()>,
    {
        let mut conn = self.connection.lock();
        // IMMEDIATE takes the write lock up front so the matrix and competitor
        // reads and the write below see the same database state.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(PersistenceError::from)?;
        let previous = Self::load_with(&tx, key)?;
        let matrix = Self::load_matrix(&tx, &key.academic_year)?;
        let competitors = Self::query_schedules(
            &tx,
            "academic_year = ?1 AND weekday = ?2 AND class_id <> ?3",
            params![
                key.academic_year.as_str(),
                weekday_index(key.weekday),
                key.class_id.as_str()
            ],
        )?;
        let revision = prepare_revision(
            key,
            previous.as_ref(),
            periods,
            expected_version,
            &matrix,
            &competitors,
            gate,
        )?;
        if revision.changed {
            tracing::debug!(%key, version = revision.document.version, "writing day schedule row");
            Self::write_schedule(&tx, &revision.document)?;
            tx.commit().map_err(PersistenceError::from)?;
        }
        Ok(revision.document)
    }
}
