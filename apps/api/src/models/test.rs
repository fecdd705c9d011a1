use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::question::AnswerRecord;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestRow {
    pub id: Uuid,
    pub test_id: String,
    pub name: String,
    pub number_of_questions: i32,
    pub available_roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A test with its submission count, newest first in listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestSummaryRow {
    pub test_id: String,
    pub name: String,
    pub number_of_questions: i32,
    pub available_roles: Vec<String>,
    pub response_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestQuestionRow {
    pub test_ref: Uuid,
    pub ordinal: i32,
    pub question_text: String,
    pub question_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestResponseRow {
    pub id: Uuid,
    pub test_ref: Uuid,
    pub candidate_name: String,
    pub candidate_email: String,
    pub candidate_phone: String,
    pub answers: Json<Vec<AnswerRecord>>,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}
