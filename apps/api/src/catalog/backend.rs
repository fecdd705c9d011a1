use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};

use crate::catalog::repository::{append_response, find_test};
use crate::catalog::selection::select_questions;
use crate::catalog::{Submission, TestDefinition};
use crate::scoring::ScoringPipeline;
use crate::session::SessionError;

/// The test-catalog collaborator as seen by the session controller.
#[async_trait]
pub trait TestBackend: Send + Sync {
    /// Loads a test with a freshly drawn random subset of its bank.
    /// Every call may return a different subset.
    async fn fetch_test(&self, test_id: &str) -> Result<TestDefinition, SessionError>;

    /// Scores and records a submission, returning the score.
    async fn submit(&self, submission: Submission) -> Result<f64, SessionError>;
}

/// Postgres-backed catalog. Scoring goes through the shared pipeline.
#[derive(Clone)]
pub struct PgTestBackend {
    pool: PgPool,
    pipeline: ScoringPipeline,
}

impl PgTestBackend {
    pub fn new(pool: PgPool, pipeline: ScoringPipeline) -> Self {
        Self { pool, pipeline }
    }
}

fn catalog_error(context: &str, e: sqlx::Error) -> SessionError {
    error!("{context}: {e}");
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            SessionError::Parse(format!("{context}: stored test data is malformed"))
        }
        _ => SessionError::Network(format!("{context}: the test catalog is unavailable")),
    }
}

#[async_trait]
impl TestBackend for PgTestBackend {
    async fn fetch_test(&self, test_id: &str) -> Result<TestDefinition, SessionError> {
        let stored = find_test(&self.pool, test_id)
            .await
            .map_err(|e| catalog_error("Loading test failed", e))?
            .ok_or_else(|| SessionError::NotFound(format!("Test {test_id} not found")))?;

        let n = usize::try_from(stored.row.number_of_questions).unwrap_or(0);
        let questions = select_questions(&stored.bank, n, &mut rand::thread_rng());

        info!(
            "Serving test {test_id}: {} of {} bank questions",
            questions.len(),
            stored.bank.len()
        );

        Ok(TestDefinition {
            test_id: stored.row.test_id,
            name: stored.row.name,
            number_of_questions: u32::try_from(stored.row.number_of_questions).unwrap_or(0),
            available_roles: stored.row.available_roles,
            questions,
        })
    }

    async fn submit(&self, submission: Submission) -> Result<f64, SessionError> {
        let stored = find_test(&self.pool, &submission.test_id)
            .await
            .map_err(|e| catalog_error("Loading test for submission failed", e))?
            .ok_or_else(|| {
                SessionError::NotFound(format!("Test {} not found", submission.test_id))
            })?;

        let score = self
            .pipeline
            .score(&submission.responses, &stored.bank)
            .await;

        append_response(&self.pool, stored.row.id, &submission, score)
            .await
            .map_err(|e| catalog_error("Recording submission failed", e))?;

        info!(
            "Recorded submission for test {} from '{}': score={score}",
            submission.test_id, submission.candidate_email
        );
        Ok(score)
    }
}
