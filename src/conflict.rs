//! Cross-class teacher availability.
//!
//! A teacher can only stand in one room at a time. Before a day document is
//! replaced, every instructional period in the candidate is checked against the
//! instructional periods that *other* classes already hold for the same weekday
//! and academic year.

use crate::ids::{AcademicYear, ClassId, SubjectId, TeacherId};
use crate::period::{Period, intervals_overlap};
use crate::schedule::{DaySchedule, ScheduleKey};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A structurally valid candidate books a teacher who is already teaching
/// another class at an overlapping time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictError {
    pub teacher_id: TeacherId,
    pub weekday: Weekday,
    pub academic_year: AcademicYear,
    /// Row of the candidate list that collides.
    pub candidate_index: usize,
    pub candidate_period_number: u32,
    #[serde(with = "crate::period::clock_time")]
    pub candidate_start: NaiveTime,
    #[serde(with = "crate::period::clock_time")]
    pub candidate_end: NaiveTime,
    pub conflicting_class_id: ClassId,
    pub conflicting_period_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting_subject_id: Option<SubjectId>,
    #[serde(with = "crate::period::clock_time")]
    pub conflicting_start: NaiveTime,
    #[serde(with = "crate::period::clock_time")]
    pub conflicting_end: NaiveTime,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "teacher {} is already teaching class {} (period {}, {}-{}) on {}; row {} (period {}, {}-{}) collides",
            self.teacher_id,
            self.conflicting_class_id,
            self.conflicting_period_number,
            self.conflicting_start.format(crate::period::clock_time::FORMAT),
            self.conflicting_end.format(crate::period::clock_time::FORMAT),
            self.weekday,
            self.candidate_index,
            self.candidate_period_number,
            self.candidate_start.format(crate::period::clock_time::FORMAT),
            self.candidate_end.format(crate::period::clock_time::FORMAT),
        )
    }
}

impl std::error::Error for ConflictError {}

#[derive(Debug, Clone)]
struct BookedSlot {
    class_id: ClassId,
    period_number: u32,
    subject_id: Option<SubjectId>,
    start: NaiveTime,
    end: NaiveTime,
}

/// Per-teacher booked intervals for one weekday, each list sorted by start.
#[derive(Debug, Default)]
pub struct TeacherTimeline {
    slots: HashMap<TeacherId, Vec<BookedSlot>>,
}

impl TeacherTimeline {
    /// Collects the instructional periods of every schedule for `weekday` and
    /// `year` except those belonging to `excluded_class`.
    pub fn from_schedules(
        schedules: &[DaySchedule],
        weekday: Weekday,
        year: &AcademicYear,
        excluded_class: &ClassId,
    ) -> Self {
        let mut slots: HashMap<TeacherId, Vec<BookedSlot>> = HashMap::new();
        let relevant = schedules.iter().filter(|s| {
            s.weekday == weekday && &s.academic_year == year && &s.class_id != excluded_class
        });
        for schedule in relevant {
            for period in &schedule.periods {
                let Some(teacher) = period.assigned_teacher() else {
                    continue;
                };
                slots.entry(teacher.clone()).or_default().push(BookedSlot {
                    class_id: schedule.class_id.clone(),
                    period_number: period.period_number,
                    subject_id: period.subject_id.clone(),
                    start: period.start_time,
                    end: period.end_time,
                });
            }
        }
        for list in slots.values_mut() {
            list.sort_by_key(|slot| (slot.start, slot.end));
        }
        Self { slots }
    }

    pub fn teacher_count(&self) -> usize {
        self.slots.len()
    }

    fn find_overlap(&self, teacher: &TeacherId, start: NaiveTime, end: NaiveTime) -> Option<&BookedSlot> {
        let list = self.slots.get(teacher)?;
        // Slots starting at or after `end` can never overlap.
        let candidates = list.partition_point(|slot| slot.start < end);
        list[..candidates]
            .iter()
            .find(|slot| intervals_overlap(slot.start, slot.end, start, end))
    }

    /// Whether `teacher` is free for the whole of `[start, end)`.
    pub fn is_free(&self, teacher: &TeacherId, start: NaiveTime, end: NaiveTime) -> bool {
        self.find_overlap(teacher, start, end).is_none()
    }
}

/// Checks `candidate` for `key` against the other classes' schedules.
/// Returns the first collision in candidate order.
pub fn detect_conflicts(
    key: &ScheduleKey,
    candidate: &[Period],
    others: &[DaySchedule],
) -> Result<(), ConflictError> {
    let timeline =
        TeacherTimeline::from_schedules(others, key.weekday, &key.academic_year, &key.class_id);
    for (idx, period) in candidate.iter().enumerate() {
        let Some(teacher) = period.assigned_teacher() else {
            continue;
        };
        if let Some(slot) = timeline.find_overlap(teacher, period.start_time, period.end_time) {
            return Err(ConflictError {
                teacher_id: teacher.clone(),
                weekday: key.weekday,
                academic_year: key.academic_year.clone(),
                candidate_index: idx,
                candidate_period_number: period.period_number,
                candidate_start: period.start_time,
                candidate_end: period.end_time,
                conflicting_class_id: slot.class_id.clone(),
                conflicting_period_number: slot.period_number,
                conflicting_subject_id: slot.subject_id.clone(),
                conflicting_start: slot.start,
                conflicting_end: slot.end,
            });
        }
    }
    Ok(())
}
