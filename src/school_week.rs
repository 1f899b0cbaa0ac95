use crate::error::ScheduleError;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// The weekdays on which classes are taught. Timetables can only be saved for
/// these days, and agendas are listed in Monday-first order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolWeek {
    teaching_days: Vec<Weekday>,
}

impl Default for SchoolWeek {
    fn default() -> Self {
        Self {
            teaching_days: ALL_WEEKDAYS[..5].to_vec(),
        }
    }
}

impl SchoolWeek {
    pub fn new<I>(teaching_days: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = Weekday>,
    {
        let mut days: Vec<Weekday> = teaching_days.into_iter().collect();
        if days.is_empty() {
            return Err(ScheduleError::invalid_input(
                "school week requires at least one teaching day",
            ));
        }
        days.sort_by_key(|wd| wd.num_days_from_monday());
        days.dedup();
        Ok(Self {
            teaching_days: days,
        })
    }

    /// Parses a comma separated list such as `Mon,Tue,Wed,Thu,Fri,Sat`.
    pub fn parse_list(raw: &str) -> Result<Self, ScheduleError> {
        let mut days = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            days.push(parse_weekday(part)?);
        }
        Self::new(days)
    }

    pub fn teaching_days(&self) -> &[Weekday] {
        &self.teaching_days
    }

    pub fn is_teaching_day(&self, weekday: Weekday) -> bool {
        self.teaching_days.contains(&weekday)
    }

    pub fn ensure_teaching_day(&self, weekday: Weekday) -> Result<(), ScheduleError> {
        if self.is_teaching_day(weekday) {
            Ok(())
        } else {
            Err(ScheduleError::invalid_input(format!(
                "{weekday} is not a teaching day"
            )))
        }
    }
}

pub fn parse_weekday(raw: &str) -> Result<Weekday, ScheduleError> {
    Weekday::from_str(raw.trim())
        .map_err(|_| ScheduleError::invalid_input(format!("unknown weekday '{raw}'")))
}

/// Storage encoding: 0 for Monday through 6 for Sunday.
pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_monday() as u8
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    ALL_WEEKDAYS.get(index as usize).copied()
}
