//! PostgreSQL-backed `SessionStore`.
//!
//! Each mutation is one UPDATE statement so every field write is independently
//! durable. All UPDATEs carry `NOT completed`, freezing finished sessions.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::session::models::{
    CandidateProfile, CandidateSession, ChatMessage, QuestionSlot, SessionKey,
};
use crate::session::store::{SessionStore, StoreError, TimerUpdate};

#[derive(Debug, FromRow)]
struct SessionRow {
    attempt_id: Uuid,
    messages: Json<Vec<ChatMessage>>,
    questions: Json<Vec<QuestionSlot>>,
    current_index: i32,
    time_left_seconds: Option<i32>,
    profile: Json<CandidateProfile>,
    resume_uploaded: bool,
    chat_started: bool,
    completed: bool,
}

impl From<SessionRow> for CandidateSession {
    fn from(row: SessionRow) -> Self {
        Self {
            attempt_id: row.attempt_id,
            messages: row.messages.0,
            questions: row.questions.0,
            current_index: row.current_index.max(0) as usize,
            time_left_seconds: row.time_left_seconds.map(|t| t.max(0) as u32),
            profile: row.profile.0,
            resume_uploaded: row.resume_uploaded,
            chat_started: row.chat_started,
            completed: row.completed,
        }
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs a flag-style UPDATE that binds only the session key.
    async fn execute_keyed(&self, sql: &str, key: &SessionKey) -> Result<(), StoreError> {
        sqlx::query(sql)
            .bind(key.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, key: &SessionKey, email: &str) -> Result<(), StoreError> {
        let profile = CandidateProfile {
            email: email.to_string(),
            ..Default::default()
        };
        sqlx::query(
            r#"
            INSERT INTO candidate_sessions (session_key, attempt_id, test_id, email, profile)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (session_key) DO NOTHING
            "#,
        )
        .bind(key.to_string())
        .bind(Uuid::new_v4())
        .bind(key.test_id())
        .bind(key.email())
        .bind(Json(&profile))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<CandidateSession>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT attempt_id, messages, questions, current_index, time_left_seconds,
                   profile, resume_uploaded, chat_started, completed
            FROM candidate_sessions
            WHERE session_key = $1
            "#,
        )
        .bind(key.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CandidateSession::from))
    }

    async fn append_message(
        &self,
        key: &SessionKey,
        message: ChatMessage,
    ) -> Result<(), StoreError> {
        // jsonb `||` appends in place: concurrent appends cannot drop each other.
        sqlx::query(
            r#"
            UPDATE candidate_sessions
            SET messages = messages || $2, updated_at = now()
            WHERE session_key = $1 AND NOT completed
            "#,
        )
        .bind(key.to_string())
        .bind(Json(vec![message]))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_questions(
        &self,
        key: &SessionKey,
        questions: Vec<QuestionSlot>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE candidate_sessions
            SET questions = $2, updated_at = now()
            WHERE session_key = $1 AND NOT completed
            "#,
        )
        .bind(key.to_string())
        .bind(Json(questions))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn write_answer(
        &self,
        key: &SessionKey,
        index: usize,
        text: &str,
    ) -> Result<(), StoreError> {
        let Ok(index) = i32::try_from(index) else {
            warn!("Ignoring answer for out-of-range slot {index} on {key}");
            return Ok(());
        };
        // create_missing = false: an index past the end leaves the array untouched.
        sqlx::query(
            r#"
            UPDATE candidate_sessions
            SET questions = jsonb_set(questions, ARRAY[$2::text, 'answer'], to_jsonb($3::text), false),
                updated_at = now()
            WHERE session_key = $1 AND NOT completed
            "#,
        )
        .bind(key.to_string())
        .bind(index)
        .bind(text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_index(&self, key: &SessionKey, index: usize) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE candidate_sessions
            SET current_index = $2, updated_at = now()
            WHERE session_key = $1 AND NOT completed
            "#,
        )
        .bind(key.to_string())
        .bind(i32::try_from(index).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_timer(&self, key: &SessionKey, update: TimerUpdate) -> Result<(), StoreError> {
        match update {
            TimerUpdate::Set(value) => {
                sqlx::query(
                    r#"
                    UPDATE candidate_sessions
                    SET time_left_seconds = $2, updated_at = now()
                    WHERE session_key = $1 AND NOT completed
                    "#,
                )
                .bind(key.to_string())
                .bind(value.map(|v| i32::try_from(v).unwrap_or(i32::MAX)))
                .execute(&self.pool)
                .await?;
            }
            TimerUpdate::Decrement => {
                self.execute_keyed(
                    r#"
                    UPDATE candidate_sessions
                    SET time_left_seconds = GREATEST(time_left_seconds - 1, 0), updated_at = now()
                    WHERE session_key = $1 AND NOT completed AND time_left_seconds IS NOT NULL
                    "#,
                    key,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn set_profile(
        &self,
        key: &SessionKey,
        profile: &CandidateProfile,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE candidate_sessions
            SET profile = $2, updated_at = now()
            WHERE session_key = $1 AND NOT completed
            "#,
        )
        .bind(key.to_string())
        .bind(Json(profile))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_uploaded(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.execute_keyed(
            "UPDATE candidate_sessions SET resume_uploaded = TRUE, updated_at = now() \
             WHERE session_key = $1 AND NOT completed",
            key,
        )
        .await
    }

    async fn mark_started(&self, key: &SessionKey, started: bool) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE candidate_sessions SET chat_started = $2, updated_at = now() \
             WHERE session_key = $1 AND NOT completed",
        )
        .bind(key.to_string())
        .bind(started)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_completed(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.execute_keyed(
            "UPDATE candidate_sessions \
             SET completed = TRUE, time_left_seconds = NULL, updated_at = now() \
             WHERE session_key = $1 AND NOT completed",
            key,
        )
        .await
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.execute_keyed("DELETE FROM candidate_sessions WHERE session_key = $1", key)
            .await
    }

    async fn open_keys(&self) -> Result<Vec<SessionKey>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT test_id, email FROM candidate_sessions WHERE NOT completed")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(test_id, email)| SessionKey::new(&test_id, &email).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionType;

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
    async fn test_pg_store_appends_and_freezes(pool: PgPool) {
        let store = PgSessionStore::new(pool);
        let key = SessionKey::new("12345678", "ada@example.com").unwrap();

        store.create(&key, "ada@example.com").await.unwrap();
        store
            .append_message(&key, ChatMessage::bot("👋 Resume received: cv.pdf"))
            .await
            .unwrap();
        store
            .set_questions(&key, vec![QuestionSlot::new("What is React?", QuestionType::Easy)])
            .await
            .unwrap();
        store.write_answer(&key, 0, "A UI library").await.unwrap();
        store.set_timer(&key, TimerUpdate::Set(Some(2))).await.unwrap();
        store.set_timer(&key, TimerUpdate::Decrement).await.unwrap();

        let session = store.get(&key).await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.questions[0].answer.as_deref(), Some("A UI library"));
        assert_eq!(session.time_left_seconds, Some(1));

        store.mark_completed(&key).await.unwrap();
        store
            .append_message(&key, ChatMessage::user("late"))
            .await
            .unwrap();
        let frozen = store.get(&key).await.unwrap().unwrap();
        assert_eq!(frozen.messages.len(), 1);
        assert!(frozen.completed);
        assert_eq!(frozen.time_left_seconds, None);
    }
}
