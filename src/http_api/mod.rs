use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::{
    AcademicYear, ClassId, DaySchedule, FacultyAssignment, FacultyChoices, Period, SaveRequest,
    ScheduleError, ScheduleKey, ScheduleStore, TeacherAgenda, TeacherId, TimetableEngine,
    WeeklyAgenda, school_week::parse_weekday,
};

pub struct AppState<S> {
    engine: Arc<TimetableEngine<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<S: ScheduleStore> AppState<S> {
    pub fn new(engine: TimetableEngine<S>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn with_shared(engine: Arc<TimetableEngine<S>>) -> Self {
        Self { engine }
    }

    fn engine(&self) -> &TimetableEngine<S> {
        &self.engine
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Invalid(String),
    Rejected {
        status: StatusCode,
        error: &'static str,
        message: String,
        details: Option<Value>,
    },
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn rejected(status: StatusCode, error: &'static str, source: &ScheduleError, details: Value) -> Self {
        ApiError::Rejected {
            status,
            error,
            message: source.to_string(),
            details: Some(details),
        }
    }
}

impl From<ScheduleError> for ApiError {
    fn from(value: ScheduleError) -> Self {
        match &value {
            ScheduleError::Validation(err) => ApiError::rejected(
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                &value,
                json!(err),
            ),
            ScheduleError::Conflict(err) => {
                ApiError::rejected(StatusCode::CONFLICT, "conflict", &value, json!(err))
            }
            ScheduleError::StaleVersion { expected, found } => ApiError::rejected(
                StatusCode::CONFLICT,
                "stale_version",
                &value,
                json!({ "expected": expected, "found": found }),
            ),
            ScheduleError::InvalidInput(message) => ApiError::Invalid(message.clone()),
            ScheduleError::Persistence(err) => {
                error!(error = %err, "store failure while serving request");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, details) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message, None),
            ApiError::Invalid(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message, None)
            }
            ApiError::Rejected {
                status,
                error,
                message,
                details,
            } => (status, error, message, details),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                None,
            ),
        };
        let body = Json(ErrorBody {
            error,
            message,
            details,
        });
        (status, body).into_response()
    }
}

/// Body of `PUT /years/:year/classes/:class/days/:weekday`.
#[derive(Debug, Deserialize)]
struct SaveDayPayload {
    periods: Vec<Period>,
    #[serde(default)]
    expected_version: Option<u64>,
}

pub fn router<S: ScheduleStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/years/:year/classes/:class/days/:weekday",
            get(get_day::<S>).put(save_day::<S>),
        )
        .route("/years/:year/classes/:class/agenda", get(class_agenda::<S>))
        .route("/years/:year/classes/:class/choices", get(class_choices::<S>))
        .route(
            "/years/:year/teachers/:teacher/agenda",
            get(teacher_agenda::<S>),
        )
        .route(
            "/years/:year/assignments",
            post(record_assignment::<S>).delete(remove_assignment::<S>),
        )
        .with_state(state)
}

pub async fn serve<S: ScheduleStore + 'static>(
    addr: SocketAddr,
    engine: TimetableEngine<S>,
) -> std::io::Result<()> {
    let app = router(AppState::new(engine));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn day_key(year: String, class: String, weekday: String) -> Result<ScheduleKey, ApiError> {
    let weekday = parse_weekday(&weekday)?;
    Ok(ScheduleKey::new(class, weekday, year))
}

async fn get_day<S: ScheduleStore + 'static>(
    State(state): State<AppState<S>>,
    Path((year, class, weekday)): Path<(String, String, String)>,
) -> Result<Json<DaySchedule>, ApiError> {
    let key = day_key(year, class, weekday)?;
    Ok(Json(state.engine().get_schedule(&key)?))
}

async fn save_day<S: ScheduleStore + 'static>(
    State(state): State<AppState<S>>,
    Path((year, class, weekday)): Path<(String, String, String)>,
    Json(payload): Json<SaveDayPayload>,
) -> Result<Json<DaySchedule>, ApiError> {
    let key = day_key(year, class, weekday)?;
    debug!(%key, periods = payload.periods.len(), "save requested over http");
    let request = SaveRequest {
        key,
        periods: payload.periods,
        expected_version: payload.expected_version,
    };
    Ok(Json(state.engine().save_schedule(request)?))
}

async fn class_agenda<S: ScheduleStore + 'static>(
    State(state): State<AppState<S>>,
    Path((year, class)): Path<(String, String)>,
) -> Result<Json<WeeklyAgenda>, ApiError> {
    let agenda = state
        .engine()
        .weekly_agenda(&ClassId::new(class), &AcademicYear::new(year))?;
    Ok(Json(agenda))
}

async fn class_choices<S: ScheduleStore + 'static>(
    State(state): State<AppState<S>>,
    Path((year, class)): Path<(String, String)>,
) -> Result<Json<FacultyChoices>, ApiError> {
    let choices = state
        .engine()
        .class_choices(&ClassId::new(class), &AcademicYear::new(year))?;
    Ok(Json(choices))
}

async fn teacher_agenda<S: ScheduleStore + 'static>(
    State(state): State<AppState<S>>,
    Path((year, teacher)): Path<(String, String)>,
) -> Result<Json<TeacherAgenda>, ApiError> {
    let agenda = state
        .engine()
        .teacher_agenda(&TeacherId::new(teacher), &AcademicYear::new(year))?;
    Ok(Json(agenda))
}

async fn record_assignment<S: ScheduleStore + 'static>(
    State(state): State<AppState<S>>,
    Path(year): Path<String>,
    Json(assignment): Json<FacultyAssignment>,
) -> Result<(StatusCode, Json<FacultyAssignment>), ApiError> {
    let added = state
        .engine()
        .record_assignment(&AcademicYear::new(year), &assignment)?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(assignment)))
}

async fn remove_assignment<S: ScheduleStore + 'static>(
    State(state): State<AppState<S>>,
    Path(year): Path<String>,
    Json(assignment): Json<FacultyAssignment>,
) -> Result<StatusCode, ApiError> {
    let year = AcademicYear::new(year);
    if !state.engine().remove_assignment(&year, &assignment)? {
        return Err(ApiError::not_found(format!(
            "no assignment of {} to {} for class {} in {year}",
            assignment.teacher_id, assignment.subject_id, assignment.class_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
