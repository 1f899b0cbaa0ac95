//! Runtime configuration for the `http` and `cli` binaries.
//!
//! Everything comes from environment variables; a `.env` file in the working
//! directory is honoured outside of tests.

use crate::editing::EditDefaults;
use crate::ids::AcademicYear;
use crate::period::parse_clock_time;
use crate::school_week::SchoolWeek;
use chrono::NaiveTime;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_ACADEMIC_YEAR: &str = "2025-2026";
pub const DEFAULT_DAY_START: &str = "08:00";
pub const DEFAULT_PERIOD_MINUTES: u32 = 45;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub http_addr: SocketAddr,
    /// SQLite database file; `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    /// The year the settings collaborator currently marks as active.
    pub academic_year: AcademicYear,
    pub school_week: SchoolWeek,
    pub day_start: NaiveTime,
    pub period_minutes: u32,
    pub log_filter: String,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let http_addr = var("TIMETABLE_HTTP_ADDR", DEFAULT_HTTP_ADDR)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("TIMETABLE_HTTP_ADDR".into(), e.to_string()))?;

        let db_path = lookup("TIMETABLE_DB_PATH")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let academic_year = AcademicYear::new(var("TIMETABLE_ACADEMIC_YEAR", DEFAULT_ACADEMIC_YEAR));

        let school_week = match lookup("TIMETABLE_SCHOOL_DAYS") {
            Some(raw) if !raw.trim().is_empty() => SchoolWeek::parse_list(&raw).map_err(|e| {
                ConfigError::InvalidValue("TIMETABLE_SCHOOL_DAYS".into(), e.to_string())
            })?,
            _ => SchoolWeek::default(),
        };

        let day_start_raw = var("TIMETABLE_DAY_START", DEFAULT_DAY_START);
        let day_start = parse_clock_time(&day_start_raw).ok_or_else(|| {
            ConfigError::InvalidValue(
                "TIMETABLE_DAY_START".into(),
                format!("'{day_start_raw}' is not a HH:MM time"),
            )
        })?;

        let minutes_raw = var("TIMETABLE_PERIOD_MINUTES", &DEFAULT_PERIOD_MINUTES.to_string());
        let period_minutes = minutes_raw
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=24 * 60).contains(m))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TIMETABLE_PERIOD_MINUTES".into(),
                    format!("'{minutes_raw}' is not a number of minutes"),
                )
            })?;

        let log_filter = var("RUST_LOG", "info");

        Ok(Self {
            http_addr,
            db_path,
            academic_year,
            school_week,
            day_start,
            period_minutes,
            log_filter,
        })
    }

    pub fn edit_defaults(&self) -> EditDefaults {
        EditDefaults::new(self.day_start, self.period_minutes)
    }
}
