use crate::conflict::ConflictError;
use crate::persistence::PersistenceError;
use crate::validation::ValidationError;

/// Why a schedule operation did not go through. A save that fails with any of
/// these leaves the stored document untouched.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid schedule: {0}")]
    Validation(#[from] ValidationError),

    #[error("teacher conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("schedule was modified concurrently (expected version {expected}, found {found})")]
    StaleVersion { expected: u64, found: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ScheduleError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ScheduleError::InvalidInput(message.into())
    }

    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ScheduleError::Validation(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_conflict(&self) -> Option<&ConflictError> {
        match self {
            ScheduleError::Conflict(err) => Some(err),
            _ => None,
        }
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
