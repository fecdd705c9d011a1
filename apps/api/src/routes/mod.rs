pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::catalog::handlers as catalog;
use crate::session::handlers as session;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Test catalog
        .route(
            "/api/v1/tests",
            get(catalog::handle_list_tests).post(catalog::handle_create_test),
        )
        .route(
            "/api/v1/tests/:test_id/responses",
            get(catalog::handle_list_responses),
        )
        .route("/api/v1/start/:test_id", get(catalog::handle_start_test))
        .route("/api/v1/submit", post(catalog::handle_submit))
        .route("/api/v1/generate", post(catalog::handle_generate))
        // Candidate sessions
        .route(
            "/api/v1/sessions/:test_id/resume",
            post(session::handle_upload_resume).layer(upload_limit),
        )
        .route(
            "/api/v1/sessions/:test_id/:email",
            get(session::handle_get_session),
        )
        .route(
            "/api/v1/sessions/:test_id/:email/questions",
            post(session::handle_load_questions),
        )
        .route(
            "/api/v1/sessions/:test_id/:email/answer",
            post(session::handle_answer),
        )
        .route(
            "/api/v1/sessions/:test_id/:email/continue",
            post(session::handle_continue),
        )
        .route(
            "/api/v1/sessions/:test_id/:email/restart",
            post(session::handle_restart),
        )
        .with_state(state)
}
