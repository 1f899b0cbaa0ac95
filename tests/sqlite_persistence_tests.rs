#![cfg(feature = "sqlite")]

use chrono::{NaiveTime, Weekday};
use timetable_engine::{
    AcademicYear, FacultyAssignment, Period, PeriodType, SaveRequest, ScheduleKey, ScheduleStore,
    SqliteScheduleStore, TeacherId, TimetableEngine,
};
use tempfile::NamedTempFile;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn sqlite_store_keeps_schedules_across_reopen() {
    let file = NamedTempFile::new().unwrap();
    let year = AcademicYear::new("2025-2026");
    let key = ScheduleKey::new("5", Weekday::Mon, year.clone());
    let periods = vec![
        Period::class(1, t(8, 0), t(8, 45), "Math", "T1").with_room("101"),
        Period::non_instructional(2, t(8, 45), t(9, 0), PeriodType::Break),
        Period::class(3, t(9, 0), t(9, 45), "English", "T2"),
    ];

    {
        let engine = TimetableEngine::new(SqliteScheduleStore::new(file.path()).unwrap());
        engine
            .record_assignment(&year, &FacultyAssignment::new("5", "Math", "T1"))
            .unwrap();
        engine
            .record_assignment(&year, &FacultyAssignment::new("5", "English", "T2"))
            .unwrap();
        engine
            .save_schedule(SaveRequest::new(key.clone(), periods.clone()))
            .expect("save monday");
    }

    let store = SqliteScheduleStore::new(file.path()).unwrap();
    let loaded = store
        .load_day(&key)
        .expect("load monday")
        .expect("monday exists");
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.periods, periods);
    assert_eq!(store.faculty_matrix(&year).unwrap().len(), 2);

    let engine = TimetableEngine::new(store);
    let agenda = engine
        .teacher_agenda(&TeacherId::new("T2"), &year)
        .unwrap();
    assert_eq!(agenda.days.len(), 1);
    assert_eq!(agenda.days[0].periods[0].period.period_number, 3);
}

#[test]
fn sqlite_conflict_check_sees_other_classes() {
    let store = SqliteScheduleStore::open_in_memory().unwrap();
    let year = AcademicYear::new("2025-2026");
    let engine = TimetableEngine::new(store);
    for (class, subject) in [("5", "Math"), ("6", "Science")] {
        engine
            .record_assignment(&year, &FacultyAssignment::new(class, subject, "T1"))
            .unwrap();
    }
    engine
        .save_schedule(SaveRequest::new(
            ScheduleKey::new("5", Weekday::Mon, year.clone()),
            vec![Period::class(1, t(8, 0), t(8, 45), "Math", "T1")],
        ))
        .unwrap();

    let key = ScheduleKey::new("6", Weekday::Mon, year.clone());
    let err = engine
        .save_schedule(SaveRequest::new(
            key.clone(),
            vec![Period::class(1, t(8, 0), t(8, 45), "Science", "T1")],
        ))
        .unwrap_err();
    assert_eq!(
        err.as_conflict().map(|c| c.conflicting_class_id.as_str()),
        Some("5")
    );
    assert!(engine.store().load_day(&key).unwrap().is_none());
    assert_eq!(engine.store().day_schedules(Weekday::Mon, &year).unwrap().len(), 1);
}

#[test]
fn sqlite_assignments_are_scoped_by_year() {
    let store = SqliteScheduleStore::open_in_memory().unwrap();
    let current = AcademicYear::new("2025-2026");
    let next = AcademicYear::new("2026-2027");
    let math = FacultyAssignment::new("5", "Math", "T1");

    assert!(store.record_assignment(&current, &math).unwrap());
    assert!(!store.record_assignment(&current, &math).unwrap());
    assert!(store.faculty_matrix(&next).unwrap().is_empty());

    assert!(store.remove_assignment(&current, &math).unwrap());
    assert!(!store.remove_assignment(&current, &math).unwrap());
}

#[test]
fn sqlite_refuses_to_remove_an_assignment_in_use() {
    let store = SqliteScheduleStore::open_in_memory().unwrap();
    let year = AcademicYear::new("2025-2026");
    let math = FacultyAssignment::new("5", "Math", "T1");
    let engine = TimetableEngine::new(store);
    engine.record_assignment(&year, &math).unwrap();
    engine
        .save_schedule(SaveRequest::new(
            ScheduleKey::new("5", Weekday::Wed, year.clone()),
            vec![Period::class(2, t(9, 0), t(9, 45), "Math", "T1")],
        ))
        .unwrap();

    let err = engine.store().remove_assignment(&year, &math).unwrap_err();
    assert!(err.to_string().contains("used by class 5 on Wed (period 2)"));
    assert_eq!(engine.store().faculty_matrix(&year).unwrap().len(), 1);

    engine
        .save_schedule(SaveRequest::new(
            ScheduleKey::new("5", Weekday::Wed, year.clone()),
            Vec::new(),
        ))
        .unwrap();
    assert!(engine.store().remove_assignment(&year, &math).unwrap());
}
