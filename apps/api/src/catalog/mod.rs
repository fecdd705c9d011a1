// Test catalog: authoring, candidate start, submission and generation.
// The session controller reaches this module only through backend::TestBackend.

pub mod backend;
pub mod handlers;
pub mod repository;
pub mod selection;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::question::{AnswerRecord, BankQuestion, QuestionType};
use crate::models::test::TestSummaryRow;

/// Default size of a generated question set when the request leaves it out.
pub const DEFAULT_GENERATE_COUNT: usize = 6;

/// A test as served to a candidate: the bank holds a fresh random subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    #[serde(rename = "testID")]
    pub test_id: String,
    pub name: String,
    pub number_of_questions: u32,
    pub available_roles: Vec<String>,
    pub questions: Vec<BankQuestion>,
}

#[derive(Debug, Serialize)]
pub struct StartTestResponse {
    pub success: bool,
    pub test: TestDefinition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question_text: String,
    /// Missing means `general`; an unrecognised label is rejected.
    #[serde(rename = "type", default)]
    pub question_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestRequest {
    pub name: String,
    pub number_of_questions: i64,
    #[serde(default)]
    pub available_roles: Vec<String>,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
}

/// A create request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTest {
    pub name: String,
    pub number_of_questions: i32,
    pub available_roles: Vec<String>,
    pub questions: Vec<BankQuestion>,
}

impl CreateTestRequest {
    pub fn validate(self) -> Result<NewTest, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }

        let number_of_questions = i32::try_from(self.number_of_questions)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                AppError::Validation("numberOfQuestions must be a positive integer".to_string())
            })?;

        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| {
                let text = q.question_text.trim();
                if text.is_empty() {
                    return Err(AppError::Validation(format!(
                        "question {} has no questionText",
                        i + 1
                    )));
                }
                let question_type = match q.question_type.as_deref() {
                    None => QuestionType::General,
                    Some(label) => QuestionType::from_label(label).ok_or_else(|| {
                        AppError::Validation(format!("question {} has unknown type '{label}'", i + 1))
                    })?,
                };
                Ok(BankQuestion {
                    question_text: text.to_string(),
                    question_type,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewTest {
            name,
            number_of_questions,
            available_roles: self
                .available_roles
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            questions,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTestResponse {
    pub success: bool,
    #[serde(rename = "testID")]
    pub test_id: String,
}

/// One candidate submission, as posted by the session controller or a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "testID")]
    pub test_id: String,
    #[serde(default)]
    pub candidate_name: String,
    #[serde(default)]
    pub candidate_email: String,
    #[serde(default)]
    pub candidate_phone: String,
    #[serde(default)]
    pub responses: Vec<AnswerRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub roles: Vec<String>,
    pub number_of_questions: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub questions: Vec<BankQuestion>,
}

/// One row of the test listing shown to test authors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    #[serde(rename = "testID")]
    pub test_id: String,
    pub name: String,
    pub number_of_questions: i32,
    pub available_roles: Vec<String>,
    pub response_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<TestSummaryRow> for TestSummary {
    fn from(row: TestSummaryRow) -> Self {
        Self {
            test_id: row.test_id,
            name: row.name,
            number_of_questions: row.number_of_questions,
            available_roles: row.available_roles,
            response_count: row.response_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListTestsResponse {
    pub success: bool,
    pub tests: Vec<TestSummary>,
}

/// A stored submission as listed to test authors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub candidate_name: String,
    pub candidate_email: String,
    pub candidate_phone: String,
    pub answers: Vec<AnswerRecord>,
    pub score: f64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CreateTestRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_validate_defaults_missing_type_to_general() {
        let test = request(
            r#"{"name": "Frontend", "numberOfQuestions": 2,
                "questions": [{"questionText": "Intro?"}, {"questionText": "JSX?", "type": "easy"}]}"#,
        )
        .validate()
        .unwrap();
        assert_eq!(test.questions[0].question_type, QuestionType::General);
        assert_eq!(test.questions[1].question_type, QuestionType::Easy);
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let err = request(r#"{"name": "  ", "numberOfQuestions": 2}"#)
            .validate()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_non_positive_count() {
        let err = request(r#"{"name": "T", "numberOfQuestions": 0}"#)
            .validate()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let err = request(
            r#"{"name": "T", "numberOfQuestions": 1,
                "questions": [{"questionText": "Q", "type": "expert"}]}"#,
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("expert")));
    }

    #[test]
    fn test_submission_uses_test_id_casing() {
        let submission: Submission = serde_json::from_str(
            r#"{"testID": "12345678", "candidateName": "Ada",
                "responses": [{"question": "Name?", "answer": "Ada"}]}"#,
        )
        .unwrap();
        assert_eq!(submission.test_id, "12345678");
        assert_eq!(submission.candidate_email, "");
        assert_eq!(submission.responses.len(), 1);
    }

    #[test]
    fn test_definition_serializes_wire_shape() {
        let def = TestDefinition {
            test_id: "12345678".to_string(),
            name: "Frontend".to_string(),
            number_of_questions: 1,
            available_roles: vec!["Frontend".to_string()],
            questions: vec![BankQuestion {
                question_text: "JSX?".to_string(),
                question_type: QuestionType::Easy,
            }],
        };
        let json = serde_json::to_value(def).unwrap();
        assert_eq!(json["testID"], "12345678");
        assert_eq!(json["numberOfQuestions"], 1);
        assert_eq!(json["questions"][0]["questionText"], "JSX?");
        assert_eq!(json["questions"][0]["type"], "easy");
    }

    #[test]
    fn test_summary_serializes_listing_shape() {
        let summary = TestSummary::from(TestSummaryRow {
            test_id: "12345678".to_string(),
            name: "Frontend".to_string(),
            number_of_questions: 3,
            available_roles: vec!["Frontend".to_string()],
            response_count: 2,
            created_at: chrono::Utc::now(),
        });
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["testID"], "12345678");
        assert_eq!(json["numberOfQuestions"], 3);
        assert_eq!(json["availableRoles"][0], "Frontend");
        assert_eq!(json["responseCount"], 2);
    }
}
