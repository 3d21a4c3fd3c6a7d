//! services/api/tests/http_api.rs
//!
//! Drives the full router in-process against the in-memory store and the
//! heuristic analyzer.

use api_lib::{
    adapters::{DocumentTextExtractor, KvAccountAdapter},
    config::Config,
    web::{self, AppState},
};
use attendance_core::{HeuristicAnalyzer, MemoryKeyValueStore};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let kv = Arc::new(MemoryKeyValueStore::new());
    let state = AppState::new(
        kv.clone(),
        Arc::new(KvAccountAdapter::new(kv)),
        Arc::new(DocumentTextExtractor),
        Arc::new(HeuristicAnalyzer),
        Arc::new(Config::default()),
    );
    web::router(Arc::new(state))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

const BOUNDARY: &str = "tracker-test-boundary";

fn multipart_request(uri: &str, parts: &[(&str, &str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (field, file_name, content) in parts {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn form_request(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/register",
            None,
            json!({"username": username, "password": "s3cret!", "full_name": "Test Student"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

//=========================================================================================
// Accounts
//=========================================================================================

#[tokio::test]
async fn register_login_logout_flow() {
    let app = app();
    let token = register(&app, "ada").await;

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/register", None, json!({
            "username": "ada", "password": "other", "full_name": "Someone Else"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["detail"].is_string());

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/login", None, json!({"username": "ada", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid username or password");

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/login", None, json!({"username": "ada", "password": "s3cret!"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "ada");
    assert_eq!(body["user"]["full_name"], "Test Student");
    assert_ne!(body["token"].as_str().unwrap(), token);

    let (status, _) = send(&app, json_request(Method::POST, "/logout", Some(token.as_str()), json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get("/events", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tracker_routes_require_a_token() {
    let app = app();
    let request = Request::builder().uri("/summary").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Not authenticated");

    let (status, _) = send(&app, get("/summary", "not-a-real-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

//=========================================================================================
// Tracker
//=========================================================================================

#[tokio::test]
async fn events_and_attendance_drive_the_summary() {
    let app = app();
    let token = register(&app, "grace").await;

    for day in 1..=4 {
        let (status, _) = send(
            &app,
            json_request(Method::POST, "/events", Some(token.as_str()), json!({
                "name": format!("Lecture {day}"), "date": format!("2024-01-0{day}")
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/events", Some(token.as_str()), json!({"name": "", "date": "2024-01-05"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    for (date, status) in [("2024-01-01", "present"), ("2024-01-02", "absent"), ("2024-01-02", "present")] {
        let (code, _) = send(
            &app,
            json_request(Method::POST, "/attendance", Some(token.as_str()), json!({"date": date, "status": status})),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
    }

    let (_, records) = send(&app, get("/attendance", &token)).await;
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["date"], "2024-01-02");
    assert_eq!(records[0]["status"], "present");

    let (_, events) = send(&app, get("/events", &token)).await;
    assert_eq!(events[0]["name"], "Lecture 1");
    assert_eq!(events[0]["type"], "lecture");

    let (status, summary) = send(&app, get("/summary", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["stats"]["totalClasses"], 4);
    assert_eq!(summary["stats"]["attendedClasses"], 2);
    assert_eq!(summary["stats"]["percentage"], 50);
    assert_eq!(summary["classesNeeded"], 1);
    assert_eq!(summary["streaks"]["bestStreak"], 2);
    assert_eq!(summary["goalMet"], false);
}

#[tokio::test]
async fn goal_defaults_to_75_and_rejects_out_of_range() {
    let app = app();
    let token = register(&app, "linus").await;

    let (_, body) = send(&app, get("/goal", &token)).await;
    assert_eq!(body["target_percentage"], 75.0);

    let (status, _) = send(
        &app,
        json_request(Method::PUT, "/goal", Some(token.as_str()), json!({"target_percentage": 120.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(Method::PUT, "/goal", Some(token.as_str()), json!({"target_percentage": 80.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["target_percentage"], 80.0);
}

#[tokio::test]
async fn users_do_not_see_each_others_records() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    send(
        &app,
        json_request(Method::POST, "/events", Some(alice.as_str()), json!({"name": "Physics", "date": "2024-03-01"})),
    )
    .await;

    let (_, alice_events) = send(&app, get("/events", &alice)).await;
    let (_, bob_events) = send(&app, get("/events", &bob)).await;
    assert_eq!(alice_events.as_array().unwrap().len(), 1);
    assert!(bob_events.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn import_dedups_and_delete_is_idempotent() {
    let app = app();
    let token = register(&app, "edsger").await;
    let candidates = json!({"events": [
        {"name": "Midterm", "date": "2024-02-10", "type": "exam"},
        {"name": "Midterm", "date": "2024-02-10"},
        {"name": "Orientation", "date": "2024-01-15"},
        {"name": "Broken", "date": "not a date"}
    ]});

    let (_, body) = send(&app, json_request(Method::POST, "/events/import", Some(token.as_str()), candidates.clone())).await;
    assert_eq!(body["imported"], 2);
    let (_, body) = send(&app, json_request(Method::POST, "/events/import", Some(token.as_str()), candidates)).await;
    assert_eq!(body["imported"], 0);

    let (_, events) = send(&app, get("/events", &token)).await;
    let id = events[0]["id"].as_str().unwrap().to_string();
    let delete = || {
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/events/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };
    assert_eq!(send(&app, delete()).await.0, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, delete()).await.0, StatusCode::NO_CONTENT);

    let (_, events) = send(&app, get("/events", &token)).await;
    assert_eq!(events.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn timetable_import_adds_one_event_per_slot() {
    let app = app();
    let token = register(&app, "barbara").await;
    let body = json!({"timetable_events": [
        {"subject": "Mathematics", "day": "Monday", "time": "09:00-10:00", "room": "101"},
        {"subject": "Mathematics", "day": "Monday", "time": "09:00-10:00", "room": "101"}
    ]});

    let (status, body) = send(&app, json_request(Method::POST, "/events/import-timetable", Some(token.as_str()), body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imported"], 2);

    let (_, events) = send(&app, get("/events", &token)).await;
    assert_eq!(events[0]["name"], "Mathematics");
    assert_eq!(events[0]["imported"], true);
}

#[tokio::test]
async fn export_then_import_round_trips_and_bad_documents_are_rejected() {
    let app = app();
    let token = register(&app, "donald").await;
    send(
        &app,
        json_request(Method::POST, "/events", Some(token.as_str()), json!({"name": "Lab", "date": "2024-04-02"})),
    )
    .await;
    send(
        &app,
        json_request(Method::POST, "/attendance", Some(token.as_str()), json!({"date": "2024-04-02", "status": "late"})),
    )
    .await;

    let (_, exported) = send(&app, get("/export", &token)).await;
    assert!(exported["exportDate"].is_string());
    assert_eq!(exported["targetPercentage"], 75.0);

    let raw = |body: String| {
        Request::builder()
            .method(Method::POST)
            .uri("/import")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    };

    let (status, body) = send(&app, raw(exported.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"], 1);
    assert_eq!(body["attendance"], 1);

    let (status, _) = send(&app, raw("{not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, raw(json!({"events": []}).to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, events) = send(&app, get("/events", &token)).await;
    assert_eq!(events.as_array().unwrap().len(), 1);
}

//=========================================================================================
// Document Processing and Calculators
//=========================================================================================

#[tokio::test]
async fn health_reports_healthy() {
    let app = app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn calendar_upload_uses_the_working_day_heuristic() {
    let app = app();
    let text = "Academic Calendar 2024\nThe semester has 90 working days in total.";
    let (status, body) = send(
        &app,
        multipart_request("/upload-calendar", &[("file", "calendar.txt", text)]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total_working_days"], 90);
    assert_eq!(body["confidence_score"], 0.7);
}

#[tokio::test]
async fn uploads_reject_bad_types_and_empty_text() {
    let app = app();
    let (status, _) = send(
        &app,
        multipart_request("/upload-calendar", &[("file", "calendar.docx", "whatever")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        multipart_request("/upload-calendar", &[("file", "calendar.txt", "   ")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        multipart_request("/upload-timetable", &[("file", "timetable.png", "pixels")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn combined_processing_multiplies_days_by_daily_classes() {
    let app = app();
    let calendar = "Academic year plan: 100 working days";
    let timetable = "Mathematics Monday 09:00 Room 101\nPhysics Monday 10:00\nChemistry Tuesday 11:00";
    let (status, body) = send(
        &app,
        multipart_request(
            "/process-combined",
            &[
                ("calendar_file", "calendar.txt", calendar),
                ("timetable_file", "timetable.txt", timetable),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["calendar_working_days"], 100);
    assert_eq!(body["timetable_working_days"], 2);
    assert_eq!(body["classes_per_working_day"], 1);
    assert_eq!(body["total_classes"], 100);

    let (status, _) = send(
        &app,
        multipart_request("/process-combined", &[("calendar_file", "calendar.txt", calendar)]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn calculators_report_classes_needed() {
    let app = app();
    let (status, body) = send(
        &app,
        form_request("/calculate-attendance", "total_classes=40&attended_classes=28"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attendance_percentage"], 70.0);
    assert_eq!(body["classes_to_attend_for_target"], 2);
    assert_eq!(body["target_percentage"], 75.0);

    let (status, body) = send(
        &app,
        form_request(
            "/calculate-combined-attendance",
            "total_working_days=20&classes_per_working_day=3&attended_classes=30&target_percentage=60",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_classes"], 60);
    assert_eq!(body["classes_to_attend_for_target"], 6);

    let (status, _) = send(
        &app,
        form_request(
            "/calculate-combined-attendance",
            "total_working_days=0&classes_per_working_day=3&attended_classes=0",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn debug_text_previews_the_extraction() {
    let app = app();
    let text = "x".repeat(1200);
    let (status, body) = send(&app, multipart_request("/debug-text", &[("file", "notes.txt", text.as_str())])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "notes.txt");
    assert_eq!(body["text_length"], 1200);
    assert_eq!(body["first_500_chars"].as_str().unwrap().len(), 500);
    assert_eq!(body["last_500_chars"].as_str().unwrap().len(), 500);
}
