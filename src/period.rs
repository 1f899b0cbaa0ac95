use crate::ids::{SubjectId, TeacherId};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a slot in the day is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    /// Instructional period; needs a subject and an authorized teacher.
    Class,
    Break,
    Assembly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Class => "class",
            PeriodType::Break => "break",
            PeriodType::Assembly => "assembly",
        }
    }

    pub fn is_instructional(&self) -> bool {
        matches!(self, PeriodType::Class)
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "class" => Ok(PeriodType::Class),
            "break" => Ok(PeriodType::Break),
            "assembly" => Ok(PeriodType::Assembly),
            _ => Err(()),
        }
    }
}

/// One row of a day's schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Position of the period within the day, starting at 1.
    pub period_number: u32,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub period_type: PeriodType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<SubjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<TeacherId>,
    /// Free-form room label. Stored as given; exclusivity is not checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl Period {
    pub fn class(
        period_number: u32,
        start_time: NaiveTime,
        end_time: NaiveTime,
        subject_id: impl Into<SubjectId>,
        teacher_id: impl Into<TeacherId>,
    ) -> Self {
        Self {
            period_number,
            start_time,
            end_time,
            period_type: PeriodType::Class,
            subject_id: Some(subject_id.into()),
            teacher_id: Some(teacher_id.into()),
            room: None,
        }
    }

    pub fn non_instructional(
        period_number: u32,
        start_time: NaiveTime,
        end_time: NaiveTime,
        period_type: PeriodType,
    ) -> Self {
        Self {
            period_number,
            start_time,
            end_time,
            period_type,
            subject_id: None,
            teacher_id: None,
            room: None,
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Half-open interval test on `[start_time, end_time)`; back-to-back
    /// periods do not overlap.
    pub fn overlaps(&self, other: &Period) -> bool {
        intervals_overlap(self.start_time, self.end_time, other.start_time, other.end_time)
    }

    /// Teacher of an instructional period, ignoring blank ids.
    pub fn assigned_teacher(&self) -> Option<&TeacherId> {
        if !self.period_type.is_instructional() {
            return None;
        }
        self.teacher_id.as_ref().filter(|id| !id.is_blank())
    }

    pub fn time_range_label(&self) -> String {
        format!(
            "{}-{}",
            self.start_time.format(clock_time::FORMAT),
            self.end_time.format(clock_time::FORMAT)
        )
    }
}

pub fn intervals_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, clock_time::FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Serde adapter writing times as `HH:MM`.
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock_time(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid time '{raw}', expected HH:MM")))
    }
}
