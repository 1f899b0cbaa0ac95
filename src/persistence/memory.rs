use super::{PersistenceResult, ScheduleStore, ensure_assignment_unused, prepare_revision};
use crate::error::ScheduleResult;
use crate::faculty::{FacultyAssignment, FacultyAssignmentMatrix};
use crate::ids::{AcademicYear, ClassId};
use crate::period::Period;
use crate::schedule::{DaySchedule, ScheduleKey};
use chrono::Weekday;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

#[derive(Default)]
struct MemoryState {
    schedules: HashMap<ScheduleKey, DaySchedule>,
    assignments: HashMap<AcademicYear, BTreeSet<FacultyAssignment>>,
}

impl MemoryState {
    fn matching<P>(&self, predicate: P) -> Vec<DaySchedule>
    where
        P: Fn(&ScheduleKey) -> bool,
    {
        let mut found: Vec<DaySchedule> = self
            .schedules
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(_, doc)| doc.clone())
            .collect();
        found.sort_by(|a, b| {
            a.class_id
                .cmp(&b.class_id)
                .then(a.weekday.num_days_from_monday().cmp(&b.weekday.num_days_from_monday()))
        });
        found
    }

    fn matrix(&self, year: &AcademicYear) -> FacultyAssignmentMatrix {
        self.assignments
            .get(year)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Process-local store. The write lock spans the whole of `replace_day` and of
/// `remove_assignment`, so a check always sees the state its write lands on.
#[derive(Default)]
pub struct MemoryScheduleStore {
    state: RwLock<MemoryState>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect<P>(&self, predicate: P) -> Vec<DaySchedule>
    where
        P: Fn(&ScheduleKey) -> bool,
    {
        self.state.read().matching(predicate)
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn load_day(&self, key: &ScheduleKey) -> PersistenceResult<Option<DaySchedule>> {
        Ok(self.state.read().schedules.get(key).cloned())
    }

    fn day_schedules(
        &self,
        weekday: Weekday,
        year: &AcademicYear,
    ) -> PersistenceResult<Vec<DaySchedule>> {
        Ok(self.collect(|key| key.weekday == weekday && &key.academic_year == year))
    }

    fn class_schedules(
        &self,
        class_id: &ClassId,
        year: &AcademicYear,
    ) -> PersistenceResult<Vec<DaySchedule>> {
        Ok(self.collect(|key| &key.class_id == class_id && &key.academic_year == year))
    }

    fn year_schedules(&self, year: &AcademicYear) -> PersistenceResult<Vec<DaySchedule>> {
        Ok(self.collect(|key| &key.academic_year == year))
    }

    fn faculty_matrix(&self, year: &AcademicYear) -> PersistenceResult<FacultyAssignmentMatrix> {
        Ok(self.state.read().matrix(year))
    }

    fn record_assignment(
        &self,
        year: &AcademicYear,
        assignment: &FacultyAssignment,
    ) -> PersistenceResult<bool> {
        let mut state = self.state.write();
        Ok(state
            .assignments
            .entry(year.clone())
            .or_default()
            .insert(assignment.clone()))
    }

    fn remove_assignment(
        &self,
        year: &AcademicYear,
        assignment: &FacultyAssignment,
    ) -> ScheduleResult<bool> {
        let mut state = self.state.write();
        let class_days = state.matching(|key| {
            key.class_id == assignment.class_id && &key.academic_year == year
        });
        ensure_assignment_unused(assignment, &class_days)?;
        Ok(state
            .assignments
            .get_mut(year)
            .is_some_and(|entries| entries.remove(assignment)))
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
        let mut state = self.state.write();
        let matrix = state.matrix(&key.academic_year);
        let competitors = state.matching(|other| {
            other.weekday == key.weekday
                && other.academic_year == key.academic_year
                && other.class_id != key.class_id
        });
        let revision = prepare_revision(
            key,
            state.schedules.get(key),
            periods,
            expected_version,
            &matrix,
            &competitors,
            gate,
        )?;
        if revision.changed {
            tracing::debug!(%key, version = revision.document.version, "storing day schedule in memory");
            state
                .schedules
                .insert(key.clone(), revision.document.clone());
        }
        Ok(revision.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScheduleError;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn authorizes(matrix: &FacultyAssignmentMatrix, entry: &FacultyAssignment) -> bool {
        matrix.is_authorized(&entry.class_id, &entry.subject_id, &entry.teacher_id)
    }

    #[test]
    fn failed_gate_writes_nothing() {
        let store = MemoryScheduleStore::new();
        let key = ScheduleKey::new("5", Weekday::Mon, "2025-2026");
        let periods = vec![Period::class(1, t(8, 0), t(8, 45), "Math", "T1")];
        let result = store.replace_day(&key, periods, None, |_, _| {
            Err(ScheduleError::invalid_input("rejected"))
        });
        assert!(result.is_err());
        assert!(store.load_day(&key).unwrap().is_none());
    }

    #[test]
    fn gate_sees_only_other_classes_on_same_day() {
        let store = MemoryScheduleStore::new();
        let year = "2025-2026";
        let period = || vec![Period::class(1, t(8, 0), t(8, 45), "Math", "T1")];
        for (class, day) in [("5", Weekday::Mon), ("6", Weekday::Mon), ("6", Weekday::Tue)] {
            store
                .replace_day(&ScheduleKey::new(class, day, year), period(), None, |_, _| Ok(()))
                .unwrap();
        }
        let key = ScheduleKey::new("5", Weekday::Mon, year);
        store
            .replace_day(&key, period(), None, |_, others| {
                assert_eq!(others.len(), 1);
                assert_eq!(others[0].class_id, ClassId::new("6"));
                assert_eq!(others[0].weekday, Weekday::Mon);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn gate_sees_the_matrix_of_the_saved_year() {
        let store = MemoryScheduleStore::new();
        let math = FacultyAssignment::new("5", "Math", "T1");
        store
            .record_assignment(&AcademicYear::new("2025-2026"), &math)
            .unwrap();
        store
            .record_assignment(
                &AcademicYear::new("2026-2027"),
                &FacultyAssignment::new("5", "Art", "T4"),
            )
            .unwrap();
        let key = ScheduleKey::new("5", Weekday::Mon, "2025-2026");
        store
            .replace_day(&key, Vec::new(), None, |matrix, _| {
                assert_eq!(matrix.len(), 1);
                assert!(authorizes(matrix, &math));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn assignments_are_partitioned_by_year() {
        let store = MemoryScheduleStore::new();
        let current = AcademicYear::new("2025-2026");
        let next = AcademicYear::new("2026-2027");
        let entry = FacultyAssignment::new("5", "Math", "T1");
        assert!(store.record_assignment(&current, &entry).unwrap());
        assert!(!store.record_assignment(&current, &entry).unwrap());
        assert_eq!(store.faculty_matrix(&current).unwrap().len(), 1);
        assert!(store.faculty_matrix(&next).unwrap().is_empty());
        assert!(store.remove_assignment(&current, &entry).unwrap());
        assert!(!store.remove_assignment(&next, &entry).unwrap());
    }

    #[test]
    fn assignment_in_use_is_kept() {
        let store = MemoryScheduleStore::new();
        let year = AcademicYear::new("2025-2026");
        let math = FacultyAssignment::new("5", "Math", "T1");
        store.record_assignment(&year, &math).unwrap();
        let key = ScheduleKey::new("5", Weekday::Thu, "2025-2026");
        store
            .replace_day(
                &key,
                vec![Period::class(3, t(10, 0), t(10, 45), "Math", "T1")],
                None,
                |_, _| Ok(()),
            )
            .unwrap();

        let err = store.remove_assignment(&year, &math).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidInput(_)));
        assert!(err.to_string().contains("used by class 5 on Thu (period 3)"));
        assert!(authorizes(&store.faculty_matrix(&year).unwrap(), &math));
    }
}
