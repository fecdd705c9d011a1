use anyhow::{bail, Result};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::selection::generate_test_id;
use crate::catalog::{NewTest, Submission};
use crate::models::question::{BankQuestion, QuestionType};
use crate::models::test::{TestQuestionRow, TestResponseRow, TestRow, TestSummaryRow};

/// Attempts at finding a free test id before giving up.
const MAX_ID_ATTEMPTS: usize = 5;

/// A test plus its full, ordered question bank.
#[derive(Debug, Clone)]
pub struct StoredTest {
    pub row: TestRow,
    pub bank: Vec<BankQuestion>,
}

/// Inserts a test and its bank, returning the new 8-digit test id.
///
/// Uniqueness is enforced by the `tests.test_id` constraint: a colliding id
/// makes the insert a no-op and a fresh id is drawn. There is no pre-check.
pub async fn create_test(pool: &PgPool, test: &NewTest) -> Result<String> {
    let mut tx = pool.begin().await?;

    let mut created: Option<(Uuid, String)> = None;
    for attempt in 1..=MAX_ID_ATTEMPTS {
        let test_id = generate_test_id(&mut rand::thread_rng());
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO tests (id, test_id, name, number_of_questions, available_roles)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (test_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&test_id)
        .bind(&test.name)
        .bind(test.number_of_questions)
        .bind(&test.available_roles)
        .fetch_optional(&mut *tx)
        .await?;

        match inserted {
            Some(id) => {
                created = Some((id, test_id));
                break;
            }
            None => warn!("Test id {test_id} already taken (attempt {attempt}/{MAX_ID_ATTEMPTS})"),
        }
    }

    let Some((test_ref, test_id)) = created else {
        bail!("could not allocate a unique test id after {MAX_ID_ATTEMPTS} attempts");
    };

    for (ordinal, question) in test.questions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO test_questions (test_ref, ordinal, question_text, question_type)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(test_ref)
        .bind(i32::try_from(ordinal)?)
        .bind(&question.question_text)
        .bind(question.question_type.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        "Created test {test_id} '{}' with {} bank questions",
        test.name,
        test.questions.len()
    );
    Ok(test_id)
}

/// Loads a test and its bank in ordinal order.
pub async fn find_test(pool: &PgPool, test_id: &str) -> Result<Option<StoredTest>, sqlx::Error> {
    let row: Option<TestRow> = sqlx::query_as(
        r#"
        SELECT id, test_id, name, number_of_questions, available_roles, created_at
        FROM tests
        WHERE test_id = $1
        "#,
    )
    .bind(test_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let questions: Vec<TestQuestionRow> = sqlx::query_as(
        r#"
        SELECT test_ref, ordinal, question_text, question_type
        FROM test_questions
        WHERE test_ref = $1
        ORDER BY ordinal
        "#,
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    let bank = questions
        .into_iter()
        .map(|q| BankQuestion {
            question_type: QuestionType::from_label(&q.question_type).unwrap_or_default(),
            question_text: q.question_text,
        })
        .collect();

    Ok(Some(StoredTest { row, bank }))
}

/// Every test with its submission count, newest first.
pub async fn list_tests(pool: &PgPool) -> Result<Vec<TestSummaryRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT t.test_id, t.name, t.number_of_questions, t.available_roles,
               COUNT(r.id) AS response_count, t.created_at
        FROM tests t
        LEFT JOIN test_responses r ON r.test_ref = t.id
        GROUP BY t.id
        ORDER BY t.created_at DESC, t.test_id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Records one submission. A single INSERT, so concurrent submissions to the
/// same test cannot overwrite each other.
pub async fn append_response(
    pool: &PgPool,
    test_ref: Uuid,
    submission: &Submission,
    score: f64,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO test_responses
            (id, test_ref, candidate_name, candidate_email, candidate_phone, answers, score)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(test_ref)
    .bind(&submission.candidate_name)
    .bind(&submission.candidate_email)
    .bind(&submission.candidate_phone)
    .bind(Json(&submission.responses))
    .bind(score)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Every submission for a test in arrival order. `None` when the test does not exist.
pub async fn list_responses(
    pool: &PgPool,
    test_id: &str,
) -> Result<Option<Vec<TestResponseRow>>, sqlx::Error> {
    let test_ref: Option<Uuid> = sqlx::query_scalar("SELECT id FROM tests WHERE test_id = $1")
        .bind(test_id)
        .fetch_optional(pool)
        .await?;

    let Some(test_ref) = test_ref else {
        return Ok(None);
    };

    let rows: Vec<TestResponseRow> = sqlx::query_as(
        r#"
        SELECT id, test_ref, candidate_name, candidate_email, candidate_phone,
               answers, score, created_at
        FROM test_responses
        WHERE test_ref = $1
        ORDER BY created_at, id
        "#,
    )
    .bind(test_ref)
    .fetch_all(pool)
    .await?;

    Ok(Some(rows))
}
