use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::session::models::{
    CandidateProfile, CandidateSession, ChatMessage, QuestionSlot, SessionKey,
};

/// Errors surfaced by session store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// How `set_timer` changes the stored countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerUpdate {
    Set(Option<u32>),
    /// Counts down by one second, never below zero. No-op when no countdown is stored.
    Decrement,
}

/// Durable keyed storage of one session per (test, candidate) pair.
///
/// Every mutation against a missing key is a silent no-op; only `create` adds sessions.
/// Once a session is completed its transcript, questions, index and timer are frozen.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates an empty session. A no-op when the key already exists.
    async fn create(&self, key: &SessionKey, email: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &SessionKey) -> Result<Option<CandidateSession>, StoreError>;

    async fn append_message(&self, key: &SessionKey, message: ChatMessage)
        -> Result<(), StoreError>;

    async fn set_questions(
        &self,
        key: &SessionKey,
        questions: Vec<QuestionSlot>,
    ) -> Result<(), StoreError>;

    /// Writes the answer into the slot at `index`; out-of-range indices are ignored.
    async fn write_answer(&self, key: &SessionKey, index: usize, text: &str)
        -> Result<(), StoreError>;

    async fn set_index(&self, key: &SessionKey, index: usize) -> Result<(), StoreError>;

    async fn set_timer(&self, key: &SessionKey, update: TimerUpdate) -> Result<(), StoreError>;

    async fn set_profile(&self, key: &SessionKey, profile: &CandidateProfile)
        -> Result<(), StoreError>;

    async fn mark_uploaded(&self, key: &SessionKey) -> Result<(), StoreError>;

    async fn mark_started(&self, key: &SessionKey, started: bool) -> Result<(), StoreError>;

    async fn mark_completed(&self, key: &SessionKey) -> Result<(), StoreError>;

    /// Removes the session entirely.
    async fn clear(&self, key: &SessionKey) -> Result<(), StoreError>;

    /// Keys of every session that is not yet completed.
    async fn open_keys(&self) -> Result<Vec<SessionKey>, StoreError>;
}

/// In-memory store for tests and single-process deployments without a database.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionKey, CandidateSession>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `f` to the session if it exists and is not completed.
    fn with_open(&self, key: &SessionKey, f: impl FnOnce(&mut CandidateSession)) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.get_mut(key).filter(|s| !s.completed) {
            f(session);
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, key: &SessionKey, email: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(key.clone())
            .or_insert_with(|| CandidateSession::new(email));
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<CandidateSession>, StoreError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.get(key).cloned())
    }

    async fn append_message(
        &self,
        key: &SessionKey,
        message: ChatMessage,
    ) -> Result<(), StoreError> {
        self.with_open(key, |s| s.messages.push(message));
        Ok(())
    }

    async fn set_questions(
        &self,
        key: &SessionKey,
        questions: Vec<QuestionSlot>,
    ) -> Result<(), StoreError> {
        self.with_open(key, |s| s.questions = questions);
        Ok(())
    }

    async fn write_answer(
        &self,
        key: &SessionKey,
        index: usize,
        text: &str,
    ) -> Result<(), StoreError> {
        self.with_open(key, |s| {
            if let Some(slot) = s.questions.get_mut(index) {
                slot.answer = Some(text.to_string());
            }
        });
        Ok(())
    }

    async fn set_index(&self, key: &SessionKey, index: usize) -> Result<(), StoreError> {
        self.with_open(key, |s| s.current_index = index);
        Ok(())
    }

    async fn set_timer(&self, key: &SessionKey, update: TimerUpdate) -> Result<(), StoreError> {
        self.with_open(key, |s| match update {
            TimerUpdate::Set(value) => s.time_left_seconds = value,
            TimerUpdate::Decrement => {
                if let Some(left) = s.time_left_seconds.as_mut() {
                    *left = left.saturating_sub(1);
                }
            }
        });
        Ok(())
    }

    async fn set_profile(
        &self,
        key: &SessionKey,
        profile: &CandidateProfile,
    ) -> Result<(), StoreError> {
        self.with_open(key, |s| s.profile = profile.clone());
        Ok(())
    }

    async fn mark_uploaded(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.with_open(key, |s| s.resume_uploaded = true);
        Ok(())
    }

    async fn mark_started(&self, key: &SessionKey, started: bool) -> Result<(), StoreError> {
        self.with_open(key, |s| s.chat_started = started);
        Ok(())
    }

    async fn mark_completed(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.with_open(key, |s| {
            s.completed = true;
            s.time_left_seconds = None;
        });
        Ok(())
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(key);
        Ok(())
    }

    async fn open_keys(&self) -> Result<Vec<SessionKey>, StoreError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions
            .iter()
            .filter(|(_, s)| !s.completed)
            .map(|(k, _)| k.clone())
            .collect())
    }
}
