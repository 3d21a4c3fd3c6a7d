pub mod auth;
pub mod errors;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod tracker;

pub use errors::HttpError;
pub use middleware::require_auth;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// Builds the API router. CORS and the Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/upload-calendar", post(rest::upload_calendar_handler))
        .route("/upload-timetable", post(rest::upload_timetable_handler))
        .route("/process-combined", post(rest::process_combined_handler))
        .route("/calculate-attendance", post(rest::calculate_attendance_handler))
        .route(
            "/calculate-combined-attendance",
            post(rest::calculate_combined_attendance_handler),
        )
        .route("/debug-text", post(rest::debug_text_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/logout", post(auth::logout_handler))
        .route(
            "/events",
            get(tracker::list_events_handler).post(tracker::create_event_handler),
        )
        .route("/events/{id}", delete(tracker::delete_event_handler))
        .route("/events/import", post(tracker::import_events_handler))
        .route("/events/import-timetable", post(tracker::import_timetable_handler))
        .route("/events/import-combined", post(tracker::import_combined_handler))
        .route(
            "/attendance",
            get(tracker::list_attendance_handler).post(tracker::mark_attendance_handler),
        )
        .route("/attendance/{id}", delete(tracker::delete_attendance_handler))
        .route(
            "/goal",
            get(tracker::get_goal_handler).put(tracker::set_goal_handler),
        )
        .route("/summary", get(tracker::summary_handler))
        .route("/export", get(tracker::export_handler))
        .route("/import", post(tracker::import_data_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .with_state(app_state)
}
