use chrono::{NaiveTime, Weekday};
use timetable_engine::{
    AcademicYear, FacultyAssignment, MemoryScheduleStore, Period, SaveRequest, ScheduleError,
    ScheduleKey, TimetableEngine,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

const YEAR: &str = "2025-2026";

fn seeded_engine() -> TimetableEngine<MemoryScheduleStore> {
    let engine = TimetableEngine::new(MemoryScheduleStore::new());
    for year in [YEAR, "2026-2027"] {
        let year = AcademicYear::new(year);
        for (class, subject, teacher) in [
            ("5", "Math", "T1"),
            ("5", "English", "T2"),
            ("6", "Science", "T1"),
            ("6", "Art", "T3"),
        ] {
            engine
                .record_assignment(&year, &FacultyAssignment::new(class, subject, teacher))
                .unwrap();
        }
    }
    engine
}

fn save_class_five_monday(engine: &TimetableEngine<MemoryScheduleStore>) {
    engine
        .save_schedule(SaveRequest::new(
            ScheduleKey::new("5", Weekday::Mon, YEAR),
            vec![
                Period::class(1, t(8, 0), t(8, 45), "Math", "T1"),
                Period::class(2, t(8, 45), t(9, 30), "English", "T2"),
            ],
        ))
        .unwrap();
}

#[test]
fn double_booked_teacher_is_reported_with_the_other_class() {
    let engine = seeded_engine();
    save_class_five_monday(&engine);

    let key = ScheduleKey::new("6", Weekday::Mon, YEAR);
    let err = engine
        .save_schedule(SaveRequest::new(
            key.clone(),
            vec![Period::class(1, t(8, 0), t(8, 45), "Science", "T1")],
        ))
        .unwrap_err();

    let ScheduleError::Conflict(conflict) = &err else {
        panic!("expected a conflict, got {err:?}");
    };
    assert_eq!(conflict.teacher_id.as_str(), "T1");
    assert_eq!(conflict.conflicting_class_id.as_str(), "5");
    assert_eq!(conflict.conflicting_period_number, 1);
    assert_eq!(conflict.candidate_index, 0);
    assert!(err.to_string().contains("teacher T1 is already teaching class 5"));
    assert!(!engine.get_schedule(&key).unwrap().is_persisted());
}

#[test]
fn partial_overlap_is_a_conflict() {
    let engine = seeded_engine();
    save_class_five_monday(&engine);

    let err = engine
        .save_schedule(SaveRequest::new(
            ScheduleKey::new("6", Weekday::Mon, YEAR),
            vec![Period::class(1, t(8, 30), t(9, 15), "Science", "T1")],
        ))
        .unwrap_err();
    assert!(err.as_conflict().is_some());
}

#[test]
fn adjacent_periods_in_other_classes_are_fine() {
    let engine = seeded_engine();
    save_class_five_monday(&engine);

    let saved = engine
        .save_schedule(SaveRequest::new(
            ScheduleKey::new("6", Weekday::Mon, YEAR),
            vec![Period::class(1, t(8, 45), t(9, 30), "Science", "T1")],
        ))
        .unwrap();
    assert_eq!(saved.version, 1);
}

#[test]
fn same_time_on_another_day_or_year_is_fine() {
    let engine = seeded_engine();
    save_class_five_monday(&engine);

    let candidate = vec![Period::class(1, t(8, 0), t(8, 45), "Science", "T1")];
    engine
        .save_schedule(SaveRequest::new(
            ScheduleKey::new("6", Weekday::Tue, YEAR),
            candidate.clone(),
        ))
        .unwrap();
    engine
        .save_schedule(SaveRequest::new(
            ScheduleKey::new("6", Weekday::Mon, "2026-2027"),
            candidate,
        ))
        .unwrap();
}

#[test]
fn replacing_a_day_does_not_conflict_with_its_own_old_version() {
    let engine = seeded_engine();
    save_class_five_monday(&engine);

    let key = ScheduleKey::new("5", Weekday::Mon, YEAR);
    let saved = engine
        .save_schedule(SaveRequest::new(
            key,
            vec![Period::class(1, t(8, 15), t(9, 0), "Math", "T1")],
        ))
        .unwrap();
    assert_eq!(saved.version, 2);
    assert_eq!(saved.periods.len(), 1);
}

#[test]
fn break_periods_never_conflict() {
    let engine = seeded_engine();
    save_class_five_monday(&engine);

    let mut assembly = Period::non_instructional(
        1,
        t(8, 0),
        t(8, 45),
        timetable_engine::PeriodType::Assembly,
    );
    assembly.room = Some("Hall".into());
    engine
        .save_schedule(SaveRequest::new(
            ScheduleKey::new("6", Weekday::Mon, YEAR),
            vec![assembly],
        ))
        .unwrap();
}
