//! services/api/src/web/tracker.rs
//!
//! Authenticated handlers over the caller's own record store: events,
//! attendance marks, the goal, the dashboard summary, and export/import.

use crate::web::{
    errors::{ErrorDetail, HttpError},
    state::AppState,
};
use attendance_core::{
    engine, CandidateEvent, MarkAttendance, NewEvent, RestoreDocument, TimetableEntry, User,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize)]
pub struct ImportEventsRequest {
    pub events: Vec<CandidateEvent>,
}

#[derive(Deserialize)]
pub struct ImportTimetableRequest {
    pub timetable_events: Vec<TimetableEntry>,
}

#[derive(Deserialize)]
pub struct ImportCombinedRequest {
    #[serde(default)]
    pub calendar_events: Vec<CandidateEvent>,
    #[serde(default)]
    pub timetable_events: Vec<TimetableEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    pub imported: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct GoalRequest {
    pub target_percentage: f64,
}

#[derive(Serialize, ToSchema)]
pub struct GoalResponse {
    pub target_percentage: f64,
}

#[derive(Serialize, ToSchema)]
pub struct RestoreResponse {
    pub events: usize,
    pub attendance: usize,
    pub target_percentage: f64,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

//=========================================================================================
// Events
//=========================================================================================

/// List the caller's events, earliest first.
#[utoipa::path(
    get,
    path = "/events",
    responses(
        (status = 200, description = "Events sorted by date"),
        (status = 401, description = "Not authenticated", body = ErrorDetail)
    ),
    security(("bearer" = []))
)]
pub async fn list_events_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let events = store.lock().await.events_by_date();
    Ok(Json(events))
}

/// Add a single event.
#[utoipa::path(
    post,
    path = "/events",
    request_body(content_type = "application/json", description = "`{name, date, time?, type?, description?}`"),
    responses(
        (status = 201, description = "Event created"),
        (status = 400, description = "Missing name or invalid date", body = ErrorDetail)
    ),
    security(("bearer" = []))
)]
pub async fn create_event_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(input): Json<NewEvent>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let event = store.lock().await.add_event(input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Delete an event. Unknown ids are ignored.
#[utoipa::path(
    delete,
    path = "/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses((status = 204, description = "Event removed or never existed")),
    security(("bearer" = []))
)]
pub async fn delete_event_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    store.lock().await.delete_event(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Import calendar candidates, skipping any whose date and name already exist.
#[utoipa::path(
    post,
    path = "/events/import",
    request_body(content_type = "application/json", description = "`{events: [CandidateEvent]}`"),
    responses((status = 200, description = "Number of events added", body = ImportResponse)),
    security(("bearer" = []))
)]
pub async fn import_events_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<ImportEventsRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let imported = store.lock().await.import_events(&req.events).await?;
    info!(username = %user.username, imported, "Imported calendar events");
    Ok(Json(ImportResponse { imported }))
}

/// Project timetable slots onto their next upcoming dates.
#[utoipa::path(
    post,
    path = "/events/import-timetable",
    request_body(content_type = "application/json", description = "`{timetable_events: [TimetableEntry]}`"),
    responses((status = 200, description = "Number of events added", body = ImportResponse)),
    security(("bearer" = []))
)]
pub async fn import_timetable_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<ImportTimetableRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let imported = store
        .lock()
        .await
        .import_timetable_events(&req.timetable_events, today())
        .await?;
    info!(username = %user.username, imported, "Imported timetable events");
    Ok(Json(ImportResponse { imported }))
}

/// Import both halves of a combined processing result.
#[utoipa::path(
    post,
    path = "/events/import-combined",
    request_body(content_type = "application/json", description = "`{calendar_events, timetable_events}`"),
    responses((status = 200, description = "Number of events added", body = ImportResponse)),
    security(("bearer" = []))
)]
pub async fn import_combined_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<ImportCombinedRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let imported = store
        .lock()
        .await
        .import_combined(&req.calendar_events, &req.timetable_events, today())
        .await?;
    info!(username = %user.username, imported, "Imported combined events");
    Ok(Json(ImportResponse { imported }))
}

//=========================================================================================
// Attendance
//=========================================================================================

/// List attendance marks, most recent first.
#[utoipa::path(
    get,
    path = "/attendance",
    responses((status = 200, description = "Attendance records sorted by date descending")),
    security(("bearer" = []))
)]
pub async fn list_attendance_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let records = store.lock().await.attendance_by_date();
    Ok(Json(records))
}

/// Mark attendance for a date, replacing any existing mark on that date.
#[utoipa::path(
    post,
    path = "/attendance",
    request_body(content_type = "application/json", description = "`{date, status, notes?}`"),
    responses(
        (status = 200, description = "The stored record"),
        (status = 400, description = "Missing or invalid date", body = ErrorDetail)
    ),
    security(("bearer" = []))
)]
pub async fn mark_attendance_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(input): Json<MarkAttendance>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let record = store.lock().await.mark_attendance(input).await?;
    Ok(Json(record))
}

/// Delete an attendance record. Unknown ids are ignored.
#[utoipa::path(
    delete,
    path = "/attendance/{id}",
    params(("id" = Uuid, Path, description = "Attendance record id")),
    responses((status = 204, description = "Record removed or never existed")),
    security(("bearer" = []))
)]
pub async fn delete_attendance_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    store.lock().await.delete_attendance(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Goal, Summary, Export/Import
//=========================================================================================

#[utoipa::path(
    get,
    path = "/goal",
    responses((status = 200, description = "Current target percentage", body = GoalResponse)),
    security(("bearer" = []))
)]
pub async fn get_goal_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let target_percentage = store.lock().await.target_percentage();
    Ok(Json(GoalResponse { target_percentage }))
}

#[utoipa::path(
    put,
    path = "/goal",
    request_body = GoalRequest,
    responses(
        (status = 200, description = "Goal updated", body = GoalResponse),
        (status = 400, description = "Target outside 0..=100", body = ErrorDetail)
    ),
    security(("bearer" = []))
)]
pub async fn set_goal_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<GoalRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let mut store = store.lock().await;
    store.set_goal(req.target_percentage).await?;
    Ok(Json(GoalResponse {
        target_percentage: store.target_percentage(),
    }))
}

/// Dashboard figures: stats, classes needed, streaks, and whether the goal is met.
#[utoipa::path(
    get,
    path = "/summary",
    responses((status = 200, description = "Attendance summary")),
    security(("bearer" = []))
)]
pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let snapshot = store.lock().await.snapshot();
    Ok(Json(engine::summary(&snapshot, today())))
}

#[utoipa::path(
    get,
    path = "/export",
    responses((status = 200, description = "`{events, attendance, targetPercentage, exportDate}`")),
    security(("bearer" = []))
)]
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store_for(&user.username).await?;
    let document = store.lock().await.export(Utc::now());
    Ok(Json(document))
}

/// Replace all records with the contents of an exported document.
#[utoipa::path(
    post,
    path = "/import",
    request_body(content_type = "application/json", description = "A previously exported document."),
    responses(
        (status = 200, description = "Records restored", body = RestoreResponse),
        (status = 400, description = "Unparseable or incomplete document", body = ErrorDetail)
    ),
    security(("bearer" = []))
)]
pub async fn import_data_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    body: String,
) -> Result<impl IntoResponse, HttpError> {
    let document: RestoreDocument = serde_json::from_str(&body)
        .map_err(|e| HttpError::bad_request(format!("Invalid data format: {e}")))?;

    let store = state.store_for(&user.username).await?;
    let mut store = store.lock().await;
    store.restore(document).await?;
    let response = RestoreResponse {
        events: store.event_count(),
        attendance: store.attendance_count(),
        target_percentage: store.target_percentage(),
    };
    info!(
        username = %user.username,
        events = response.events,
        attendance = response.attendance,
        "Restored records from import"
    );
    Ok(Json(response))
}
