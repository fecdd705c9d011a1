use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::catalog::repository::{create_test, list_responses, list_tests};
use crate::catalog::{
    CreateTestRequest, CreateTestResponse, GenerateRequest, GenerateResponse, ListTestsResponse,
    ResponseRecord, StartTestResponse, SubmitResponse, Submission, DEFAULT_GENERATE_COUNT,
};
use crate::errors::AppError;
use crate::models::question::BankQuestion;
use crate::state::AppState;

/// POST /api/v1/tests
pub async fn handle_create_test(
    State(state): State<AppState>,
    Json(req): Json<CreateTestRequest>,
) -> Result<(StatusCode, Json<CreateTestResponse>), AppError> {
    let test = req.validate()?;
    let test_id = create_test(&state.db, &test).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateTestResponse {
            success: true,
            test_id,
        }),
    ))
}

/// GET /api/v1/tests
pub async fn handle_list_tests(
    State(state): State<AppState>,
) -> Result<Json<ListTestsResponse>, AppError> {
    let tests = list_tests(&state.db).await?;
    Ok(Json(ListTestsResponse {
        success: true,
        tests: tests.into_iter().map(Into::into).collect(),
    }))
}

/// GET /api/v1/start/:test_id
pub async fn handle_start_test(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<StartTestResponse>, AppError> {
    let test = state.backend.fetch_test(&test_id).await?;
    Ok(Json(StartTestResponse {
        success: true,
        test,
    }))
}

/// POST /api/v1/submit
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(submission): Json<Submission>,
) -> Result<Json<SubmitResponse>, AppError> {
    if submission.test_id.trim().is_empty() {
        return Err(AppError::Validation("testID is required".to_string()));
    }
    let score = state.backend.submit(submission).await?;
    Ok(Json(SubmitResponse {
        success: true,
        score,
    }))
}

/// POST /api/v1/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let count = req.number_of_questions.unwrap_or(DEFAULT_GENERATE_COUNT);
    let slots = state.pipeline.generate(&req.roles, count).await?;
    Ok(Json(GenerateResponse {
        success: true,
        questions: slots
            .into_iter()
            .map(|s| BankQuestion {
                question_text: s.text,
                question_type: s.question_type,
            })
            .collect(),
    }))
}

/// GET /api/v1/tests/:test_id/responses
pub async fn handle_list_responses(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<Vec<ResponseRecord>>, AppError> {
    let rows = list_responses(&state.db, &test_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Test {test_id} not found")))?;

    Ok(Json(
        rows.into_iter()
            .map(|r| ResponseRecord {
                candidate_name: r.candidate_name,
                candidate_email: r.candidate_email,
                candidate_phone: r.candidate_phone,
                answers: r.answers.0,
                score: r.score,
                submitted_at: r.created_at,
            })
            .collect(),
    ))
}
