//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for document processing and the attendance
//! calculators, and the master definition for the OpenAPI specification.

use crate::adapters::text_extract::DocumentKind;
use crate::web::{
    auth::{self, AuthResponse, LoginRequest, RegisterRequest, UserProfile},
    errors::{ErrorDetail, HttpError},
    state::AppState,
    tracker::{self, GoalRequest, GoalResponse, ImportResponse, RestoreResponse},
};
use attendance_core::{engine, heuristics, DEFAULT_TARGET_PERCENTAGE};
use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Form,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        upload_calendar_handler,
        upload_timetable_handler,
        process_combined_handler,
        calculate_attendance_handler,
        calculate_combined_attendance_handler,
        debug_text_handler,
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        tracker::list_events_handler,
        tracker::create_event_handler,
        tracker::delete_event_handler,
        tracker::import_events_handler,
        tracker::import_timetable_handler,
        tracker::import_combined_handler,
        tracker::list_attendance_handler,
        tracker::mark_attendance_handler,
        tracker::delete_attendance_handler,
        tracker::get_goal_handler,
        tracker::set_goal_handler,
        tracker::summary_handler,
        tracker::export_handler,
        tracker::import_data_handler,
    ),
    components(
        schemas(
            ErrorDetail, HealthResponse, DebugTextResponse, CalculateAttendanceForm,
            CalculateCombinedForm, RegisterRequest, LoginRequest, AuthResponse, UserProfile,
            GoalRequest, GoalResponse, ImportResponse, RestoreResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Attendance Tracker API", description = "Calendar and timetable processing plus per-user attendance records.")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct DebugTextResponse {
    pub filename: String,
    pub text_length: usize,
    pub first_500_chars: String,
    pub last_500_chars: String,
}

fn default_target() -> f64 {
    DEFAULT_TARGET_PERCENTAGE
}

#[derive(Deserialize, ToSchema)]
pub struct CalculateAttendanceForm {
    pub total_classes: i64,
    pub attended_classes: i64,
    #[serde(default = "default_target")]
    pub target_percentage: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct CalculateCombinedForm {
    pub total_working_days: i64,
    pub classes_per_working_day: i64,
    pub attended_classes: i64,
    #[serde(default = "default_target")]
    pub target_percentage: f64,
}

//=========================================================================================
// Upload Helpers
//=========================================================================================

/// A file part pulled out of a multipart request.
struct Upload {
    file_name: String,
    data: Bytes,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> HttpError {
    HttpError::new(e.status(), format!("Failed to read multipart data: {}", e.body_text()))
}

async fn read_field(field: Field<'_>) -> Result<Upload, HttpError> {
    let file_name = field.file_name().unwrap_or("upload.txt").to_string();
    let data = field.bytes().await.map_err(multipart_error)?;
    Ok(Upload { file_name, data })
}

/// Reads the first file part of the request.
async fn single_upload(multipart: &mut Multipart) -> Result<Upload, HttpError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.file_name().is_some() {
            return read_field(field).await;
        }
    }
    Err(HttpError::bad_request("Multipart form must include a file"))
}

fn require_kind(upload: &Upload, allowed: &[DocumentKind]) -> Result<(), HttpError> {
    match DocumentKind::from_file_name(&upload.file_name) {
        Some(kind) if allowed.contains(&kind) => Ok(()),
        _ => Err(HttpError::bad_request(format!(
            "Unsupported file type for '{}'",
            upload.file_name
        ))),
    }
}

/// Extracts text from an upload, rejecting documents that yield none.
async fn extract_text(state: &AppState, upload: &Upload) -> Result<String, HttpError> {
    let text = state
        .extractor
        .extract_text(&upload.file_name, &upload.data)
        .await
        .map_err(|e| {
            error!("Text extraction failed for '{}': {:?}", upload.file_name, e);
            HttpError::bad_request(format!("Could not read '{}'", upload.file_name))
        })?;

    if text.trim().is_empty() {
        return Err(match DocumentKind::from_file_name(&upload.file_name) {
            Some(DocumentKind::Image) => HttpError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "No text could be extracted from the image",
            ),
            _ => HttpError::bad_request("No text could be extracted from the file"),
        });
    }
    info!("Extracted {} chars from '{}'", text.len(), upload.file_name);
    Ok(text)
}

const CALENDAR_KINDS: &[DocumentKind] = &[DocumentKind::Pdf, DocumentKind::PlainText];
const TIMETABLE_KINDS: &[DocumentKind] =
    &[DocumentKind::Pdf, DocumentKind::PlainText, DocumentKind::Image];

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

/// Analyze an academic calendar (PDF or text).
#[utoipa::path(
    post,
    path = "/upload-calendar",
    request_body(content_type = "multipart/form-data", description = "The calendar document."),
    responses(
        (status = 200, description = "Extracted calendar events and working days"),
        (status = 400, description = "Missing file, unsupported type, or no text", body = ErrorDetail),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_calendar_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let upload = single_upload(&mut multipart).await?;
    require_kind(&upload, CALENDAR_KINDS)?;
    let text = extract_text(&app_state, &upload).await?;
    let result = app_state.analyzer.analyze_calendar(&text).await?;
    info!(
        "Calendar '{}': {} events, {} working days",
        upload.file_name,
        result.events.len(),
        result.total_working_days
    );
    Ok(Json(result))
}

/// Analyze a weekly timetable (PDF, text, or image).
#[utoipa::path(
    post,
    path = "/upload-timetable",
    request_body(content_type = "multipart/form-data", description = "The timetable document."),
    responses(
        (status = 200, description = "Extracted class slots and weekly schedule"),
        (status = 400, description = "Missing file, unsupported type, or no text", body = ErrorDetail),
        (status = 422, description = "Image uploads cannot be read without OCR", body = ErrorDetail)
    )
)]
pub async fn upload_timetable_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let upload = single_upload(&mut multipart).await?;
    require_kind(&upload, TIMETABLE_KINDS)?;
    let text = extract_text(&app_state, &upload).await?;
    let result = app_state.analyzer.analyze_timetable(&text).await?;
    info!(
        "Timetable '{}': {} class slots",
        upload.file_name,
        result.timetable_events.len()
    );
    Ok(Json(result))
}

/// Analyze a calendar and a timetable together and derive the total class count.
#[utoipa::path(
    post,
    path = "/process-combined",
    request_body(
        content_type = "multipart/form-data",
        description = "Two file parts named `calendar_file` and `timetable_file`."
    ),
    responses(
        (status = 200, description = "Combined extraction result"),
        (status = 400, description = "A file is missing or unreadable", body = ErrorDetail)
    )
)]
pub async fn process_combined_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut calendar = None;
    let mut timetable = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("calendar_file") => calendar = Some(read_field(field).await?),
            Some("timetable_file") => timetable = Some(read_field(field).await?),
            _ => {}
        }
    }
    let calendar = calendar.ok_or_else(|| HttpError::bad_request("calendar_file is required"))?;
    let timetable =
        timetable.ok_or_else(|| HttpError::bad_request("timetable_file is required"))?;
    require_kind(&calendar, CALENDAR_KINDS)?;
    require_kind(&timetable, TIMETABLE_KINDS)?;

    let calendar_text = extract_text(&app_state, &calendar).await?;
    let timetable_text = extract_text(&app_state, &timetable).await?;
    let calendar_result = app_state.analyzer.analyze_calendar(&calendar_text).await?;
    let timetable_result = app_state.analyzer.analyze_timetable(&timetable_text).await?;

    let combined = heuristics::combine(calendar_result, timetable_result);
    info!(
        "Combined processing: {} working days x {} classes/day = {} classes",
        combined.calendar_working_days, combined.classes_per_working_day, combined.total_classes
    );
    Ok(Json(combined))
}

/// Attendance figures for explicit class counts.
#[utoipa::path(
    post,
    path = "/calculate-attendance",
    request_body(content = CalculateAttendanceForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Attendance report"),
        (status = 400, description = "Negative counts or target out of range", body = ErrorDetail)
    )
)]
pub async fn calculate_attendance_handler(
    Form(form): Form<CalculateAttendanceForm>,
) -> Result<impl IntoResponse, HttpError> {
    let report = engine::attendance_for_counts(
        form.total_classes,
        form.attended_classes,
        form.target_percentage,
    )?;
    Ok(Json(report))
}

/// Attendance figures where the total is working days times classes per day.
#[utoipa::path(
    post,
    path = "/calculate-combined-attendance",
    request_body(content = CalculateCombinedForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Attendance report"),
        (status = 400, description = "Invalid counts or target out of range", body = ErrorDetail)
    )
)]
pub async fn calculate_combined_attendance_handler(
    Form(form): Form<CalculateCombinedForm>,
) -> Result<impl IntoResponse, HttpError> {
    if form.total_working_days < 0 || form.classes_per_working_day < 0 {
        return Err(HttpError::bad_request("Invalid input values"));
    }
    let total_classes = form
        .total_working_days
        .checked_mul(form.classes_per_working_day)
        .ok_or_else(|| HttpError::bad_request("Invalid input values"))?;
    let report = engine::combined_attendance(
        form.attended_classes,
        form.target_percentage,
        total_classes,
    )?;
    Ok(Json(report))
}

/// Show what text an upload yields, for diagnosing extraction problems.
#[utoipa::path(
    post,
    path = "/debug-text",
    request_body(content_type = "multipart/form-data", description = "Any supported document."),
    responses(
        (status = 200, description = "Extraction preview", body = DebugTextResponse),
        (status = 400, description = "Missing or unreadable file", body = ErrorDetail)
    )
)]
pub async fn debug_text_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let upload = single_upload(&mut multipart).await?;
    require_kind(&upload, TIMETABLE_KINDS)?;
    let text = app_state
        .extractor
        .extract_text(&upload.file_name, &upload.data)
        .await
        .map_err(|e| {
            error!("Text extraction failed for '{}': {:?}", upload.file_name, e);
            HttpError::bad_request(format!("Could not read '{}'", upload.file_name))
        })?;

    let char_count = text.chars().count();
    Ok(Json(DebugTextResponse {
        filename: upload.file_name,
        text_length: char_count,
        first_500_chars: text.chars().take(500).collect(),
        last_500_chars: text.chars().skip(char_count.saturating_sub(500)).collect(),
    }))
}
