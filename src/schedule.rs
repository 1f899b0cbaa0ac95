use crate::ids::{AcademicYear, ClassId, SubjectId, TeacherId};
use crate::period::Period;
use crate::school_week::ALL_WEEKDAYS;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one persisted day document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleKey {
    pub class_id: ClassId,
    pub weekday: Weekday,
    pub academic_year: AcademicYear,
}

impl ScheduleKey {
    pub fn new(
        class_id: impl Into<ClassId>,
        weekday: Weekday,
        academic_year: impl Into<AcademicYear>,
    ) -> Self {
        Self {
            class_id: class_id.into(),
            weekday,
            academic_year: academic_year.into(),
        }
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "class {} on {} ({})",
            self.class_id, self.weekday, self.academic_year
        )
    }
}

/// All periods of one class on one weekday of one academic year.
///
/// A document is replaced wholesale on every save. Stored periods are sorted by
/// start time and never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub class_id: ClassId,
    pub weekday: Weekday,
    pub academic_year: AcademicYear,
    /// 0 until the first save; bumped whenever the stored period list changes.
    #[serde(default)]
    pub version: u64,
    pub periods: Vec<Period>,
}

impl DaySchedule {
    pub fn empty(key: &ScheduleKey) -> Self {
        Self {
            class_id: key.class_id.clone(),
            weekday: key.weekday,
            academic_year: key.academic_year.clone(),
            version: 0,
            periods: Vec::new(),
        }
    }

    pub fn key(&self) -> ScheduleKey {
        ScheduleKey {
            class_id: self.class_id.clone(),
            weekday: self.weekday,
            academic_year: self.academic_year.clone(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

/// Builds the document that a successful save stores: periods ordered by start
/// time, version bumped only when the content differs from `previous`.
pub(crate) fn next_revision(
    key: &ScheduleKey,
    previous: Option<&DaySchedule>,
    mut periods: Vec<Period>,
) -> DaySchedule {
    periods.sort_by_key(|p| (p.start_time, p.period_number));
    match previous {
        Some(existing) if existing.periods == periods => existing.clone(),
        Some(existing) => DaySchedule {
            version: existing.version + 1,
            periods,
            ..DaySchedule::empty(key)
        },
        None => DaySchedule {
            version: 1,
            periods,
            ..DaySchedule::empty(key)
        },
    }
}

/// Periods of one weekday inside an agenda.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaDay<T> {
    pub weekday: Weekday,
    pub periods: Vec<T>,
}

/// Class-facing week view: every stored day of a class, Monday first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAgenda {
    pub class_id: ClassId,
    pub academic_year: AcademicYear,
    pub days: Vec<AgendaDay<Period>>,
}

impl WeeklyAgenda {
    pub fn from_schedules(
        class_id: ClassId,
        academic_year: AcademicYear,
        schedules: &[DaySchedule],
    ) -> Self {
        let mut days = Vec::new();
        for weekday in ALL_WEEKDAYS {
            let mut periods: Vec<Period> = schedules
                .iter()
                .filter(|s| s.weekday == weekday && s.class_id == class_id)
                .flat_map(|s| s.periods.iter().cloned())
                .collect();
            if periods.is_empty() {
                continue;
            }
            periods.sort_by_key(|p| (p.start_time, p.period_number));
            days.push(AgendaDay { weekday, periods });
        }
        Self {
            class_id,
            academic_year,
            days,
        }
    }

    pub fn day(&self, weekday: Weekday) -> Option<&AgendaDay<Period>> {
        self.days.iter().find(|d| d.weekday == weekday)
    }
}

/// One instructional period a teacher is booked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherAgendaEntry {
    pub class_id: ClassId,
    #[serde(flatten)]
    pub period: Period,
}

impl TeacherAgendaEntry {
    pub fn subject_id(&self) -> Option<&SubjectId> {
        self.period.subject_id.as_ref()
    }
}

/// Teacher-facing week view aggregated across every class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherAgenda {
    pub teacher_id: TeacherId,
    pub academic_year: AcademicYear,
    pub days: Vec<AgendaDay<TeacherAgendaEntry>>,
}

impl TeacherAgenda {
    pub fn from_schedules(
        teacher_id: TeacherId,
        academic_year: AcademicYear,
        schedules: &[DaySchedule],
    ) -> Self {
        let mut days = Vec::new();
        for weekday in ALL_WEEKDAYS {
            let mut entries: Vec<TeacherAgendaEntry> = schedules
                .iter()
                .filter(|s| s.weekday == weekday)
                .flat_map(|s| {
                    s.periods
                        .iter()
                        .filter(|p| p.assigned_teacher() == Some(&teacher_id))
                        .map(|p| TeacherAgendaEntry {
                            class_id: s.class_id.clone(),
                            period: p.clone(),
                        })
                })
                .collect();
            if entries.is_empty() {
                continue;
            }
            entries.sort_by(|a, b| {
                a.period
                    .start_time
                    .cmp(&b.period.start_time)
                    .then_with(|| a.class_id.cmp(&b.class_id))
            });
            days.push(AgendaDay {
                weekday,
                periods: entries,
            });
        }
        Self {
            teacher_id,
            academic_year,
            days,
        }
    }

    pub fn day(&self, weekday: Weekday) -> Option<&AgendaDay<TeacherAgendaEntry>> {
        self.days.iter().find(|d| d.weekday == weekday)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodType;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn key() -> ScheduleKey {
        ScheduleKey::new("5", Weekday::Mon, "2025-2026")
    }

    #[test]
    fn first_revision_sorts_by_start_time() {
        let periods = vec![
            Period::class(2, t(8, 45), t(9, 30), "English", "T2"),
            Period::class(1, t(8, 0), t(8, 45), "Math", "T1"),
        ];
        let doc = next_revision(&key(), None, periods);
        assert_eq!(doc.version, 1);
        assert_eq!(doc.periods[0].period_number, 1);
        assert_eq!(doc.periods[1].period_number, 2);
    }

    #[test]
    fn unchanged_content_keeps_version() {
        let periods = vec![Period::class(1, t(8, 0), t(8, 45), "Math", "T1")];
        let first = next_revision(&key(), None, periods.clone());
        let again = next_revision(&key(), Some(&first), periods);
        assert_eq!(again, first);

        let changed = next_revision(
            &key(),
            Some(&first),
            vec![Period::non_instructional(1, t(8, 0), t(8, 30), PeriodType::Assembly)],
        );
        assert_eq!(changed.version, 2);
    }

    #[test]
    fn teacher_agenda_skips_other_teachers_and_non_class_periods() {
        let mut monday = DaySchedule::empty(&key());
        monday.periods = vec![
            Period::class(1, t(8, 0), t(8, 45), "Math", "T1"),
            Period::non_instructional(2, t(8, 45), t(9, 0), PeriodType::Break),
            Period::class(3, t(9, 0), t(9, 45), "English", "T2"),
        ];
        let agenda = TeacherAgenda::from_schedules(
            TeacherId::new("T1"),
            AcademicYear::new("2025-2026"),
            &[monday],
        );
        let day = agenda.day(Weekday::Mon).unwrap();
        assert_eq!(day.periods.len(), 1);
        assert_eq!(day.periods[0].class_id, ClassId::new("5"));
        assert!(agenda.day(Weekday::Tue).is_none());
    }
}
