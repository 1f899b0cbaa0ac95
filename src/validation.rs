use crate::faculty::FacultyAssignmentMatrix;
use crate::ids::{ClassId, SubjectId, TeacherId};
use crate::period::{Period, PeriodType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Check categories, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Subject/teacher presence does not match the period type.
    Fields,
    /// A period does not start before it ends.
    Times,
    /// Two periods of the day share time.
    Overlap,
    /// Period numbers are not positive, unique and chronological.
    Ordering,
    /// A class period names a teacher not assigned to that subject and class.
    Authorization,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Fields => "fields",
            ViolationKind::Times => "times",
            ViolationKind::Overlap => "overlap",
            ViolationKind::Ordering => "ordering",
            ViolationKind::Authorization => "authorization",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodViolation {
    /// Position of the offending row in the submitted list.
    pub index: usize,
    pub period_number: u32,
    pub reason: String,
}

/// The candidate period list is malformed. Carries every violation of the
/// first failing category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ViolationKind,
    pub violations: Vec<PeriodViolation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} check failed", self.kind)?;
        for (i, violation) in self.violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(
                f,
                "{sep}row {} (period {}) {}",
                violation.index, violation.period_number, violation.reason
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

struct Violations {
    kind: ViolationKind,
    found: Vec<PeriodViolation>,
}

impl Violations {
    fn new(kind: ViolationKind) -> Self {
        Self {
            kind,
            found: Vec::new(),
        }
    }

    fn push(&mut self, index: usize, period: &Period, reason: impl Into<String>) {
        self.found.push(PeriodViolation {
            index,
            period_number: period.period_number,
            reason: reason.into(),
        });
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.found.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                kind: self.kind,
                violations: self.found,
            })
        }
    }
}

fn present_subject(period: &Period) -> Option<&SubjectId> {
    period.subject_id.as_ref().filter(|id| !id.is_blank())
}

fn present_teacher(period: &Period) -> Option<&TeacherId> {
    period.teacher_id.as_ref().filter(|id| !id.is_blank())
}

pub fn check_fields(periods: &[Period]) -> Result<(), ValidationError> {
    let mut violations = Violations::new(ViolationKind::Fields);
    for (idx, period) in periods.iter().enumerate() {
        let subject = present_subject(period);
        let teacher = present_teacher(period);
        match period.period_type {
            PeriodType::Class => match (subject, teacher) {
                (Some(_), Some(_)) => {}
                (None, Some(_)) => violations.push(idx, period, "class period requires a subject"),
                (Some(_), None) => violations.push(idx, period, "class period requires a teacher"),
                (None, None) => violations.push(
                    idx,
                    period,
                    "class period requires a subject and a teacher",
                ),
            },
            PeriodType::Break | PeriodType::Assembly => {
                if subject.is_some() || teacher.is_some() {
                    violations.push(
                        idx,
                        period,
                        format!(
                            "{} period must not have a subject or teacher",
                            period.period_type
                        ),
                    );
                }
            }
        }
    }
    violations.finish()
}

pub fn check_times(periods: &[Period]) -> Result<(), ValidationError> {
    let mut violations = Violations::new(ViolationKind::Times);
    for (idx, period) in periods.iter().enumerate() {
        if period.start_time >= period.end_time {
            violations.push(
                idx,
                period,
                format!(
                    "must start before it ends (got {})",
                    period.time_range_label()
                ),
            );
        }
    }
    violations.finish()
}

pub fn check_overlaps(periods: &[Period]) -> Result<(), ValidationError> {
    let mut violations = Violations::new(ViolationKind::Overlap);
    // Each row is reported once, against the first row it collides with.
    let mut flagged: BTreeMap<usize, String> = BTreeMap::new();
    for (i, earlier) in periods.iter().enumerate() {
        for (j, later) in periods.iter().enumerate().skip(i + 1) {
            if !earlier.overlaps(later) {
                continue;
            }
            flagged.entry(i).or_insert_with(|| overlap_reason(earlier, j, later));
            flagged.entry(j).or_insert_with(|| overlap_reason(later, i, earlier));
        }
    }
    for (idx, reason) in flagged {
        violations.push(idx, &periods[idx], reason);
    }
    violations.finish()
}

fn overlap_reason(period: &Period, other_idx: usize, other: &Period) -> String {
    format!(
        "{} overlaps row {} (period {}, {})",
        period.time_range_label(),
        other_idx,
        other.period_number,
        other.time_range_label()
    )
}

pub fn check_ordering(periods: &[Period]) -> Result<(), ValidationError> {
    let mut violations = Violations::new(ViolationKind::Ordering);

    let mut first_use: HashMap<u32, usize> = HashMap::with_capacity(periods.len());
    for (idx, period) in periods.iter().enumerate() {
        if period.period_number == 0 {
            violations.push(idx, period, "period number must be positive");
            continue;
        }
        let first = *first_use.entry(period.period_number).or_insert(idx);
        if first != idx {
            violations.push(
                idx,
                period,
                format!(
                    "period number {} is already used by row {first}",
                    period.period_number
                ),
            );
        }
    }

    let mut chronological: Vec<usize> = (0..periods.len()).collect();
    chronological.sort_by_key(|&idx| (periods[idx].start_time, idx));
    for pair in chronological.windows(2) {
        let (prev, next) = (&periods[pair[0]], &periods[pair[1]]);
        if next.period_number < prev.period_number {
            violations.push(
                pair[1],
                next,
                format!(
                    "starts at {} after period {} but is numbered before it",
                    next.start_time.format(crate::period::clock_time::FORMAT),
                    prev.period_number
                ),
            );
        }
    }

    violations.finish()
}

pub fn check_authorization(
    class_id: &ClassId,
    periods: &[Period],
    matrix: &FacultyAssignmentMatrix,
) -> Result<(), ValidationError> {
    let mut violations = Violations::new(ViolationKind::Authorization);
    for (idx, period) in periods.iter().enumerate() {
        if !period.period_type.is_instructional() {
            continue;
        }
        let (Some(subject), Some(teacher)) = (present_subject(period), present_teacher(period))
        else {
            continue;
        };
        if !matrix.is_authorized(class_id, subject, teacher) {
            violations.push(
                idx,
                period,
                format!("teacher {teacher} is not assigned to teach {subject} in class {class_id}"),
            );
        }
    }
    violations.finish()
}

/// Structural checks on one day's candidate period list for `class_id`.
///
/// Categories run in order (fields, times, overlap, ordering, authorization);
/// the first category with any violation is returned with all of its
/// violations and later categories are not evaluated.
pub fn validate_periods(
    class_id: &ClassId,
    periods: &[Period],
    matrix: &FacultyAssignmentMatrix,
) -> Result<(), ValidationError> {
    check_fields(periods)?;
    check_times(periods)?;
    check_overlaps(periods)?;
    check_ordering(periods)?;
    check_authorization(class_id, periods, matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn ordering_flags_duplicate_numbers() {
        let periods = vec![
            Period::non_instructional(1, t(8, 0), t(8, 15), PeriodType::Assembly),
            Period::non_instructional(1, t(8, 15), t(8, 30), PeriodType::Break),
        ];
        let err = check_ordering(&periods).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Ordering);
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].index, 1);
    }

    #[test]
    fn repeated_numbers_point_at_the_first_use() {
        let periods = vec![
            Period::non_instructional(1, t(8, 0), t(8, 15), PeriodType::Assembly),
            Period::non_instructional(1, t(8, 15), t(8, 30), PeriodType::Break),
            Period::non_instructional(1, t(8, 30), t(8, 45), PeriodType::Break),
        ];
        let err = check_ordering(&periods).unwrap_err();
        let duplicates: Vec<(usize, &str)> = err
            .violations
            .iter()
            .map(|v| (v.index, v.reason.as_str()))
            .collect();
        assert_eq!(
            duplicates,
            vec![
                (1, "period number 1 is already used by row 0"),
                (2, "period number 1 is already used by row 0"),
            ]
        );
    }

    #[test]
    fn overlap_reports_both_rows_once() {
        let periods = vec![
            Period::non_instructional(1, t(8, 0), t(9, 0), PeriodType::Assembly),
            Period::non_instructional(2, t(8, 30), t(9, 30), PeriodType::Break),
            Period::non_instructional(3, t(8, 45), t(9, 15), PeriodType::Break),
        ];
        let err = check_overlaps(&periods).unwrap_err();
        let indices: Vec<usize> = err.violations.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(err.violations[0].reason.contains("overlaps row 1"));
    }

    #[test]
    fn ordering_accepts_out_of_position_rows_with_chronological_numbers() {
        let periods = vec![
            Period::non_instructional(2, t(8, 15), t(8, 30), PeriodType::Break),
            Period::non_instructional(1, t(8, 0), t(8, 15), PeriodType::Assembly),
        ];
        assert!(check_ordering(&periods).is_ok());
    }

    #[test]
    fn ordering_flags_numbers_against_time_order() {
        let periods = vec![
            Period::non_instructional(2, t(8, 0), t(8, 15), PeriodType::Assembly),
            Period::non_instructional(1, t(8, 15), t(8, 30), PeriodType::Break),
        ];
        let err = check_ordering(&periods).unwrap_err();
        assert_eq!(err.violations[0].index, 1);
        assert_eq!(err.violations[0].period_number, 1);
    }

    #[test]
    fn zero_period_number_is_rejected() {
        let periods = vec![Period::non_instructional(0, t(8, 0), t(8, 15), PeriodType::Break)];
        let err = check_ordering(&periods).unwrap_err();
        assert!(err.violations[0].reason.contains("positive"));
    }

    #[test]
    fn blank_ids_count_as_missing() {
        let mut period = Period::class(1, t(8, 0), t(8, 45), "Math", "T1");
        period.teacher_id = Some(TeacherId::new("  "));
        let err = check_fields(&[period]).unwrap_err();
        assert_eq!(err.violations[0].reason, "class period requires a teacher");
    }

    #[test]
    fn display_lists_each_violation() {
        let periods = vec![
            Period::class(1, t(8, 0), t(8, 45), "Math", "T1"),
            Period::class(2, t(8, 0), t(8, 45), "English", "T2"),
        ];
        let err = check_overlaps(&periods).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("overlap check failed: row 0 (period 1)"));
        assert!(message.contains("; row 1 (period 2)"));
    }
}
