use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::session::models::{SessionKey, SessionView};
use crate::state::AppState;

/// Multipart field carrying the resume file.
const RESUME_FIELD: &str = "resume";

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub text: String,
}

fn session_key(test_id: &str, email: &str) -> Result<SessionKey, AppError> {
    Ok(SessionKey::new(test_id, email)?)
}

/// POST /api/v1/sessions/:test_id/resume
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid upload: {e}")))?
    {
        if field.name() != Some(RESUME_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("resume").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("invalid upload: {e}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or_else(|| {
        AppError::Validation(format!("multipart field '{RESUME_FIELD}' is required"))
    })?;
    info!("Resume '{file_name}' uploaded for test {test_id} ({} bytes)", bytes.len());

    let profile = state.extractor.extract(&file_name, bytes).await?;
    let view = state
        .controller
        .accept_resume(&test_id, profile, &file_name)
        .await?;
    Ok(Json(view))
}

/// GET /api/v1/sessions/:test_id/:email
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path((test_id, email)): Path<(String, String)>,
) -> Result<Json<SessionView>, AppError> {
    let key = session_key(&test_id, &email)?;
    Ok(Json(state.controller.view(&key).await?))
}

/// POST /api/v1/sessions/:test_id/:email/questions
pub async fn handle_load_questions(
    State(state): State<AppState>,
    Path((test_id, email)): Path<(String, String)>,
) -> Result<Json<SessionView>, AppError> {
    let key = session_key(&test_id, &email)?;
    Ok(Json(state.controller.load_questions(&key).await?))
}

/// POST /api/v1/sessions/:test_id/:email/answer
pub async fn handle_answer(
    State(state): State<AppState>,
    Path((test_id, email)): Path<(String, String)>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<SessionView>, AppError> {
    let key = session_key(&test_id, &email)?;
    Ok(Json(state.controller.answer(&key, &req.text).await?))
}

/// POST /api/v1/sessions/:test_id/:email/continue
pub async fn handle_continue(
    State(state): State<AppState>,
    Path((test_id, email)): Path<(String, String)>,
) -> Result<Json<SessionView>, AppError> {
    let key = session_key(&test_id, &email)?;
    Ok(Json(state.controller.continue_session(&key).await?))
}

/// POST /api/v1/sessions/:test_id/:email/restart
pub async fn handle_restart(
    State(state): State<AppState>,
    Path((test_id, email)): Path<(String, String)>,
) -> Result<Json<SessionView>, AppError> {
    let key = session_key(&test_id, &email)?;
    Ok(Json(state.controller.restart(&key).await?))
}
