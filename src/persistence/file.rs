use super::PersistenceResult;
use crate::faculty::FacultyAssignment;
use crate::ids::AcademicYear;
use crate::period::clock_time;
use crate::schedule::{DaySchedule, WeeklyAgenda};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Everything the engine holds for one academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableSnapshot {
    pub academic_year: AcademicYear,
    #[serde(default)]
    pub assignments: Vec<FacultyAssignment>,
    #[serde(default)]
    pub schedules: Vec<DaySchedule>,
}

pub fn save_snapshot_to_json<P: AsRef<Path>>(
    snapshot: &TimetableSnapshot,
    path: P,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<TimetableSnapshot> {
    let file = File::open(path)?;
    let snapshot: TimetableSnapshot = serde_json::from_reader(file)?;
    Ok(snapshot)
}

#[derive(Debug, Serialize)]
struct AgendaCsvRecord<'a> {
    class_id: &'a str,
    academic_year: &'a str,
    weekday: String,
    period_number: u32,
    start_time: String,
    end_time: String,
    period_type: &'static str,
    subject_id: &'a str,
    teacher_id: &'a str,
    room: &'a str,
}

/// Writes one CSV row per period of the agenda, Monday first.
pub fn write_class_agenda_csv<W: Write>(agenda: &WeeklyAgenda, writer: W) -> PersistenceResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for day in &agenda.days {
        for period in &day.periods {
            csv_writer.serialize(AgendaCsvRecord {
                class_id: agenda.class_id.as_str(),
                academic_year: agenda.academic_year.as_str(),
                weekday: day.weekday.to_string(),
                period_number: period.period_number,
                start_time: period.start_time.format(clock_time::FORMAT).to_string(),
                end_time: period.end_time.format(clock_time::FORMAT).to_string(),
                period_type: period.period_type.as_str(),
                subject_id: period.subject_id.as_ref().map(|s| s.as_str()).unwrap_or(""),
                teacher_id: period.teacher_id.as_ref().map(|t| t.as_str()).unwrap_or(""),
                room: period.room.as_deref().unwrap_or(""),
            })?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn export_class_agenda_csv<P: AsRef<Path>>(
    agenda: &WeeklyAgenda,
    path: P,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    write_class_agenda_csv(agenda, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::{Period, PeriodType};
    use crate::schedule::ScheduleKey;
    use chrono::{NaiveTime, Weekday};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn agenda_csv_has_header_and_one_row_per_period() {
        let mut monday = DaySchedule::empty(&ScheduleKey::new("5", Weekday::Mon, "2025-2026"));
        monday.periods = vec![
            Period::class(1, t(8, 0), t(8, 45), "Math", "T1").with_room("101"),
            Period::non_instructional(2, t(8, 45), t(9, 0), PeriodType::Break),
        ];
        let agenda = WeeklyAgenda::from_schedules(
            "5".into(),
            "2025-2026".into(),
            &[monday],
        );

        let mut buffer = Vec::new();
        write_class_agenda_csv(&agenda, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("class_id,academic_year,weekday,period_number"));
        assert_eq!(lines[1], "5,2025-2026,Mon,1,08:00,08:45,class,Math,T1,101");
        assert_eq!(lines[2], "5,2025-2026,Mon,2,08:45,09:00,break,,,");
    }
}
