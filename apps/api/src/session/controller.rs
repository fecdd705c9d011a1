//! Candidate session state machine.
//!
//! All mutations of a session go through `SessionController` while holding the
//! `live` lock, so HTTP actions and timer ticks are applied one at a time.
//! The lock is released across the two network boundaries (question fetch and
//! submission); results coming back from them are checked against the session's
//! attempt id and dropped when the session was restarted in the meantime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::backend::TestBackend;
use crate::catalog::Submission;
use crate::session::models::{
    profile_slots, CandidateProfile, CandidateSession, ChatMessage, QuestionSlot, SessionKey,
    SessionPhase, SessionView,
};
use crate::session::store::{SessionStore, TimerUpdate};
use crate::session::timer::{seconds_for, TickOutcome, Timer};
use crate::session::SessionError;

pub const TIME_UP_MESSAGE: &str = "⏰ Time's up! Moving on.";
pub const ALL_ANSWERED_MESSAGE: &str = "✅ All questions answered.";
pub const SUBMIT_FAILED_MESSAGE: &str = "❌ Submission failed. Score: 0";

pub fn greeting(file_name: &str) -> String {
    format!("👋 Resume received: {file_name}")
}

pub fn submitted_message(score: f64) -> String {
    format!("✅ Test submitted! Score: {score}")
}

/// Process-local state: countdowns and in-flight network calls, keyed by session.
/// In-flight maps hold the attempt id that started the call.
#[derive(Default)]
struct Live {
    timer: Timer,
    loading: HashMap<SessionKey, Uuid>,
    submitting: HashMap<SessionKey, Uuid>,
}

/// What happened after an answer was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    Asked,
    Finished,
}

#[derive(Clone)]
pub struct SessionController {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn TestBackend>,
    live: Arc<Mutex<Live>>,
}

impl SessionController {
    pub fn new(store: Arc<dyn SessionStore>, backend: Arc<dyn TestBackend>) -> Self {
        Self {
            store,
            backend,
            live: Arc::new(Mutex::new(Live::default())),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Public actions
    // ────────────────────────────────────────────────────────────────────────

    /// A resume was parsed into `profile`. Creates the session and loads its
    /// questions, or rehydrates an existing session for the same key.
    pub async fn accept_resume(
        &self,
        test_id: &str,
        profile: CandidateProfile,
        file_name: &str,
    ) -> Result<SessionView, SessionError> {
        let profile = profile.normalized();
        let key = SessionKey::new(test_id, &profile.email)?;

        {
            let mut live = self.live.lock().await;

            if let Some(existing) = self.store.get(&key).await? {
                if existing.completed {
                    info!("Resume re-uploaded for completed session {key}; returning history");
                    return self.view_locked(&live, &key).await;
                }
                if !existing.messages.is_empty() {
                    self.suspend(&mut live, &key, &existing).await?;
                    return self.view_locked(&live, &key).await;
                }
            }

            self.store.create(&key, &profile.email).await?;
            self.store
                .append_message(&key, ChatMessage::bot(greeting(file_name)))
                .await?;
            self.store.set_profile(&key, &profile).await?;
            self.store.mark_uploaded(&key).await?;
            info!("Session {key} created from resume '{file_name}'");
        }

        self.load_questions(&key).await
    }

    /// Fetches the test once and starts the question sequence.
    /// A failed fetch leaves the session untouched; calling again retries.
    pub async fn load_questions(&self, key: &SessionKey) -> Result<SessionView, SessionError> {
        let attempt = {
            let mut live = self.live.lock().await;
            let session = self.require(key).await?;

            if session.completed {
                return Err(SessionError::State("session is already completed".to_string()));
            }
            if !session.resume_uploaded {
                return Err(SessionError::State("no resume has been accepted yet".to_string()));
            }
            if !session.questions.is_empty() || live.loading.contains_key(key) {
                return self.view_locked(&live, key).await;
            }

            live.loading.insert(key.clone(), session.attempt_id);
            session.attempt_id
        };

        debug!("Fetching test {} for {key}", key.test_id());
        let fetched = self.backend.fetch_test(key.test_id()).await;

        let needs_submit = {
            let mut live = self.live.lock().await;
            if live.loading.get(key) == Some(&attempt) {
                live.loading.remove(key);
            }

            let definition = fetched.map_err(|e| {
                warn!("Question fetch for {key} failed: {e}");
                e
            })?;

            let Some(session) = self.current_attempt(key, attempt).await? else {
                info!("Discarding questions fetched for a previous attempt of {key}");
                return self.view_locked(&live, key).await;
            };
            if !session.questions.is_empty() || session.completed {
                return self.view_locked(&live, key).await;
            }

            let bank_len = definition.questions.len();
            let mut questions = profile_slots(&session.profile);
            questions.extend(definition.questions.into_iter().map(QuestionSlot::from));
            info!(
                "Loaded {} questions for {key} ({bank_len} from test '{}')",
                questions.len(),
                definition.name
            );

            self.store.set_questions(key, questions).await?;
            self.store.mark_started(key, true).await?;
            self.advance(&mut live, key).await? == Advance::Finished
        };

        if needs_submit {
            self.submit(key).await?;
        }
        self.view(key).await
    }

    /// Records the candidate's answer to the current question.
    pub async fn answer(&self, key: &SessionKey, text: &str) -> Result<SessionView, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::Validation("answer text is required".to_string()));
        }

        let needs_submit = {
            let mut live = self.live.lock().await;
            let session = self.require(key).await?;
            let phase = session.phase();
            if phase != SessionPhase::Answering {
                return Err(SessionError::State(format!(
                    "cannot answer while the session is {phase:?}"
                )));
            }
            self.record_answer(&mut live, key, &session, text, ChatMessage::user(text))
                .await?
                == Advance::Finished
        };

        if needs_submit {
            self.submit(key).await?;
        }
        self.view(key).await
    }

    /// Advances every armed countdown by one second and auto-advances expired
    /// questions. Returns the sessions whose last question just expired; the
    /// caller submits them.
    ///
    /// Countdown persistence runs after the live lock is released, so a slow
    /// store delays only the stored values, never other sessions' actions.
    pub async fn tick(&self) -> Vec<SessionKey> {
        let mut running = Vec::new();
        let mut finished = Vec::new();

        {
            let mut live = self.live.lock().await;
            let outcomes = live.timer.tick();
            for (key, outcome) in outcomes {
                match outcome {
                    TickOutcome::Running(_) => running.push(key),
                    TickOutcome::Expired => match self.expire(&mut live, &key).await {
                        Ok(Advance::Finished) => finished.push(key),
                        Ok(Advance::Asked) => {}
                        Err(e) => error!("Expiring current question of {key} failed: {e}"),
                    },
                }
            }
        }

        for key in running {
            if let Err(e) = self.store.set_timer(&key, TimerUpdate::Decrement).await {
                warn!("Persisting countdown for {key} failed: {e}");
            }
        }

        finished
    }

    /// Submits a fully answered session. One-shot: a session is submitted at
    /// most once and the outcome, success or failure, completes it.
    pub async fn submit(&self, key: &SessionKey) -> Result<(), SessionError> {
        let (submission, attempt) = {
            let mut live = self.live.lock().await;
            let session = self.require(key).await?;

            if session.completed || live.submitting.contains_key(key) {
                return Ok(());
            }
            if session.questions.is_empty() || session.first_pending() < session.questions.len() {
                return Err(SessionError::State(
                    "questions remain unanswered".to_string(),
                ));
            }

            live.submitting.insert(key.clone(), session.attempt_id);
            live.timer.disarm(key);

            let submission = Submission {
                test_id: key.test_id().to_string(),
                candidate_name: session.candidate_name(),
                candidate_email: key.email().to_string(),
                candidate_phone: session.candidate_phone(),
                responses: session.answers(),
            };
            (submission, session.attempt_id)
        };

        info!("Submitting {key} ({} answers)", submission.responses.len());
        let result = self.backend.submit(submission).await;

        let mut live = self.live.lock().await;
        if live.submitting.get(key) == Some(&attempt) {
            live.submitting.remove(key);
        }

        let Some(session) = self.current_attempt(key, attempt).await? else {
            info!("Discarding submission result for a previous attempt of {key}");
            return Ok(());
        };
        if session.completed {
            return Ok(());
        }

        let message = match result {
            Ok(score) => {
                info!("Session {key} completed with score {score}");
                submitted_message(score)
            }
            Err(e) => {
                warn!("Submission for {key} failed, completing with score 0: {e}");
                SUBMIT_FAILED_MESSAGE.to_string()
            }
        };
        self.store
            .append_message(key, ChatMessage::bot(message))
            .await?;
        self.store.mark_completed(key).await?;
        Ok(())
    }

    /// Leaves the welcome-back prompt and resumes exactly where the session stopped.
    pub async fn continue_session(&self, key: &SessionKey) -> Result<SessionView, SessionError> {
        let needs_submit = {
            let mut live = self.live.lock().await;
            let session = self.require(key).await?;
            let phase = session.phase();
            if phase != SessionPhase::WelcomeBack {
                return Err(SessionError::State(format!(
                    "nothing to continue while the session is {phase:?}"
                )));
            }

            self.store.mark_started(key, true).await?;
            info!("Session {key} continued at question {}", session.current_index);

            match session.current_slot() {
                None => true,
                Some(slot) => match session.time_left_seconds {
                    Some(0) => self.expire(&mut live, key).await? == Advance::Finished,
                    Some(left) => {
                        live.timer.arm(key, left);
                        false
                    }
                    None => {
                        // Untimed slot, or the countdown was never persisted.
                        if let Some(seconds) = seconds_for(slot.question_type) {
                            self.store
                                .set_timer(key, TimerUpdate::Set(Some(seconds)))
                                .await?;
                            live.timer.arm(key, seconds);
                        }
                        false
                    }
                },
            }
        };

        if needs_submit {
            self.submit(key).await?;
        }
        self.view(key).await
    }

    /// Drops the session entirely. The next resume upload starts from scratch.
    pub async fn restart(&self, key: &SessionKey) -> Result<SessionView, SessionError> {
        let mut live = self.live.lock().await;
        live.timer.disarm(key);
        live.loading.remove(key);
        live.submitting.remove(key);
        self.store.clear(key).await?;
        info!("Session {key} restarted");
        Ok(SessionView::awaiting_resume(key))
    }

    /// Puts a started session behind the welcome-back prompt.
    pub async fn rehydrate(&self, key: &SessionKey) -> Result<SessionView, SessionError> {
        let mut live = self.live.lock().await;
        if let Some(session) = self.store.get(key).await? {
            self.suspend(&mut live, key, &session).await?;
        }
        self.view_locked(&live, key).await
    }

    /// Rehydrates every unfinished session. Run once at startup, since
    /// countdowns do not survive a process restart.
    pub async fn recover(&self) -> Result<usize, SessionError> {
        let keys = self.store.open_keys().await?;
        let mut recovered = 0;
        for key in &keys {
            let view = self.rehydrate(key).await?;
            if view.phase == SessionPhase::WelcomeBack {
                recovered += 1;
            }
        }
        info!("Recovered {recovered} of {} open sessions", keys.len());
        Ok(recovered)
    }

    pub async fn view(&self, key: &SessionKey) -> Result<SessionView, SessionError> {
        let live = self.live.lock().await;
        self.view_locked(&live, key).await
    }

    // ────────────────────────────────────────────────────────────────────────
    // Transitions (caller holds the live lock)
    // ────────────────────────────────────────────────────────────────────────

    async fn view_locked(&self, live: &Live, key: &SessionKey) -> Result<SessionView, SessionError> {
        let Some(session) = self.store.get(key).await? else {
            return Ok(SessionView::awaiting_resume(key));
        };
        let phase = match session.phase() {
            SessionPhase::ProfileReady if live.loading.contains_key(key) => {
                SessionPhase::QuestionsLoading
            }
            phase => phase,
        };
        Ok(SessionView {
            session_key: key.to_string(),
            phase,
            session: Some(session),
        })
    }

    async fn suspend(
        &self,
        live: &mut Live,
        key: &SessionKey,
        session: &CandidateSession,
    ) -> Result<(), SessionError> {
        if session.completed || !session.chat_started || session.messages.is_empty() {
            return Ok(());
        }
        // The stored countdown is already current: every tick persists it.
        live.timer.disarm(key);
        self.store.mark_started(key, false).await?;
        info!("Session {key} rehydrated; awaiting continue or restart");
        Ok(())
    }

    /// Writes `answer` into the current slot and moves on.
    async fn record_answer(
        &self,
        live: &mut Live,
        key: &SessionKey,
        session: &CandidateSession,
        answer: &str,
        message: ChatMessage,
    ) -> Result<Advance, SessionError> {
        let index = session.first_pending();
        self.store.append_message(key, message).await?;
        self.store.write_answer(key, index, answer).await?;
        live.timer.disarm(key);
        self.store.set_timer(key, TimerUpdate::Set(None)).await?;
        self.advance(live, key).await
    }

    /// The current countdown ran out: record an empty answer and move on.
    async fn expire(&self, live: &mut Live, key: &SessionKey) -> Result<Advance, SessionError> {
        let session = self.require(key).await?;
        if session.phase() != SessionPhase::Answering {
            return Ok(Advance::Asked);
        }
        info!("Time ran out on question {} of {key}", session.current_index);
        self.store.set_timer(key, TimerUpdate::Set(Some(0))).await?;
        self.record_answer(live, key, &session, "", ChatMessage::bot(TIME_UP_MESSAGE))
            .await
    }

    /// Points the index at the first pending slot and asks it, arming its
    /// countdown. With nothing pending, announces completion.
    async fn advance(&self, live: &mut Live, key: &SessionKey) -> Result<Advance, SessionError> {
        let session = self.require(key).await?;
        let next = session.first_pending();
        self.store.set_index(key, next).await?;

        let Some(slot) = session.questions.get(next) else {
            live.timer.disarm(key);
            self.store.set_timer(key, TimerUpdate::Set(None)).await?;
            self.store
                .append_message(key, ChatMessage::bot(ALL_ANSWERED_MESSAGE))
                .await?;
            debug!("All questions answered for {key}");
            return Ok(Advance::Finished);
        };

        self.store
            .append_message(key, ChatMessage::bot(slot.text.clone()))
            .await?;
        let seconds = seconds_for(slot.question_type);
        self.store.set_timer(key, TimerUpdate::Set(seconds)).await?;
        if let Some(seconds) = seconds {
            if live.timer.arm(key, seconds) {
                warn!("Countdown for {key} was still armed when question {next} was asked");
            }
        }
        debug!("Asked question {next} of {key} ({})", slot.question_type);
        Ok(Advance::Asked)
    }

    async fn require(&self, key: &SessionKey) -> Result<CandidateSession, SessionError> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("session {key}")))
    }

    /// The session, only if it still belongs to `attempt`.
    async fn current_attempt(
        &self,
        key: &SessionKey,
        attempt: Uuid,
    ) -> Result<Option<CandidateSession>, SessionError> {
        Ok(self
            .store
            .get(key)
            .await?
            .filter(|s| s.attempt_id == attempt))
    }
}

/// Drives `tick` once per second. Submissions triggered by expiry run on their
/// own tasks so a slow scoring call never delays other countdowns.
pub fn spawn_ticker(controller: SessionController) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            for key in controller.tick().await {
                let controller = controller.clone();
                tokio::spawn(async move {
                    if let Err(e) = controller.submit(&key).await {
                        error!("Submitting {key} after expiry failed: {e}");
                    }
                });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::catalog::backend::testing::{definition, StubBackend};
    use crate::catalog::TestDefinition;
    use crate::models::question::QuestionType;
    use crate::session::models::{Sender, EMAIL_PROMPT, NAME_PROMPT, PHONE_PROMPT};
    use crate::session::store::{InMemorySessionStore, StoreError};

    const TEST_ID: &str = "12345678";
    const EMAIL: &str = "ada@example.com";

    fn profile() -> CandidateProfile {
        CandidateProfile {
            name: "Ada Lovelace".to_string(),
            email: EMAIL.to_string(),
            phone: String::new(),
        }
    }

    fn key() -> SessionKey {
        SessionKey::new(TEST_ID, EMAIL).unwrap()
    }

    fn setup() -> (SessionController, Arc<InMemorySessionStore>, Arc<StubBackend>) {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(StubBackend::serving(definition(TEST_ID)));
        let controller = SessionController::new(store.clone(), backend.clone());
        (controller, store, backend)
    }

    async fn snapshot(store: &InMemorySessionStore) -> CandidateSession {
        store.get(&key()).await.unwrap().unwrap()
    }

    fn assert_index_derived(session: &CandidateSession) {
        assert_eq!(session.current_index, session.first_pending());
    }

    fn last_text(session: &CandidateSession) -> &str {
        &session.messages.last().unwrap().text
    }

    /// Uploads a resume and answers the phone slot, leaving the React question asked.
    async fn start_at_first_bank_question(controller: &SessionController) {
        controller
            .accept_resume(TEST_ID, profile(), "cv.pdf")
            .await
            .unwrap();
        controller.answer(&key(), "5551234567").await.unwrap();
    }

    #[tokio::test]
    async fn test_resume_starts_session_and_asks_first_missing_profile_field() {
        let (controller, store, _) = setup();

        let view = controller
            .accept_resume(TEST_ID, profile(), "cv.pdf")
            .await
            .unwrap();
        assert_eq!(view.phase, SessionPhase::Answering);

        let session = snapshot(&store).await;
        assert_eq!(session.messages[0], ChatMessage::bot("👋 Resume received: cv.pdf"));
        assert_eq!(last_text(&session), PHONE_PROMPT);
        let texts: Vec<_> = session.questions.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![NAME_PROMPT, EMAIL_PROMPT, PHONE_PROMPT, "What is React?", "What is Axios?"]
        );
        assert_eq!(session.current_index, 2);
        assert_eq!(session.time_left_seconds, None);
        assert!(session.resume_uploaded && session.chat_started);
        assert_index_derived(&session);
    }

    #[tokio::test]
    async fn test_empty_email_is_rejected_without_creating_anything() {
        let (controller, store, backend) = setup();
        let err = controller
            .accept_resume(
                TEST_ID,
                CandidateProfile {
                    name: "Ada".to_string(),
                    ..Default::default()
                },
                "cv.pdf",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Validation(_)));
        assert!(store.open_keys().await.unwrap().is_empty());
        assert_eq!(backend.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_answer_arms_countdown_for_timed_question() {
        let (controller, store, _) = setup();
        start_at_first_bank_question(&controller).await;

        let session = snapshot(&store).await;
        assert_eq!(last_text(&session), "What is React?");
        assert_eq!(session.current_index, 3);
        assert_eq!(session.time_left_seconds, Some(20));
        assert_eq!(session.questions[2].answer.as_deref(), Some("5551234567"));
        assert_index_derived(&session);
    }

    #[tokio::test]
    async fn test_full_run_submits_once_and_completes_with_score() {
        let (controller, store, backend) = setup();
        backend.push_submit(Ok(35.0));
        start_at_first_bank_question(&controller).await;

        controller.answer(&key(), "A UI library").await.unwrap();
        assert_index_derived(&snapshot(&store).await);
        let view = controller.answer(&key(), "An HTTP client").await.unwrap();
        assert_eq!(view.phase, SessionPhase::Completed);

        let session = snapshot(&store).await;
        let n = session.messages.len();
        assert_eq!(session.messages[n - 2].text, ALL_ANSWERED_MESSAGE);
        assert_eq!(session.messages[n - 1].text, "✅ Test submitted! Score: 35");
        assert_eq!(session.time_left_seconds, None);
        assert_index_derived(&session);

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].candidate_name, "Ada Lovelace");
        assert_eq!(submissions[0].candidate_email, EMAIL);
        assert_eq!(submissions[0].candidate_phone, "5551234567");
        assert_eq!(submissions[0].responses.len(), 5);
        assert_eq!(submissions[0].responses[0].question, NAME_PROMPT);
        assert_eq!(submissions[0].responses[4].answer, "An HTTP client");
    }

    #[tokio::test]
    async fn test_submission_failure_still_completes_with_notice() {
        let (controller, store, backend) = setup();
        backend.push_submit(Err(SessionError::Network("connection refused".to_string())));
        start_at_first_bank_question(&controller).await;

        controller.answer(&key(), "A").await.unwrap();
        let view = controller.answer(&key(), "B").await.unwrap();

        assert_eq!(view.phase, SessionPhase::Completed);
        let session = snapshot(&store).await;
        assert!(session.completed);
        assert_eq!(last_text(&session), SUBMIT_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_completed_session_rejects_further_changes() {
        let (controller, store, backend) = setup();
        start_at_first_bank_question(&controller).await;
        controller.answer(&key(), "A").await.unwrap();
        controller.answer(&key(), "B").await.unwrap();
        let done = snapshot(&store).await;

        let err = controller.answer(&key(), "late").await.unwrap_err();
        assert!(matches!(err, SessionError::State(_)));
        controller.submit(&key()).await.unwrap();
        assert!(controller.tick().await.is_empty());
        let err = controller.continue_session(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::State(_)));
        let view = controller
            .accept_resume(TEST_ID, profile(), "again.pdf")
            .await
            .unwrap();
        assert_eq!(view.phase, SessionPhase::Completed);

        assert_eq!(snapshot(&store).await, done);
        assert_eq!(backend.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_answer_is_validation_error_without_mutation() {
        let (controller, store, _) = setup();
        start_at_first_bank_question(&controller).await;
        let before = snapshot(&store).await;

        let err = controller.answer(&key(), "   ").await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert_eq!(snapshot(&store).await, before);
    }

    #[tokio::test]
    async fn test_expiry_records_empty_answer_and_moves_on() {
        let (controller, store, _) = setup();
        start_at_first_bank_question(&controller).await;

        for _ in 0..19 {
            assert!(controller.tick().await.is_empty());
        }
        assert_eq!(snapshot(&store).await.time_left_seconds, Some(1));

        assert!(controller.tick().await.is_empty());
        let session = snapshot(&store).await;
        assert_eq!(session.questions[3].answer.as_deref(), Some(""));
        assert!(session
            .messages
            .iter()
            .any(|m| m.sender == Sender::Bot && m.text == TIME_UP_MESSAGE));
        assert_eq!(last_text(&session), "What is Axios?");
        assert_eq!(session.current_index, 4);
        assert_eq!(session.time_left_seconds, Some(30));
        assert_index_derived(&session);
    }

    #[tokio::test]
    async fn test_expiry_of_last_question_hands_back_key_for_submission() {
        let (controller, store, backend) = setup();
        backend.push_submit(Ok(12.0));
        start_at_first_bank_question(&controller).await;
        controller.answer(&key(), "A UI library").await.unwrap();

        let mut finished = Vec::new();
        for _ in 0..30 {
            finished = controller.tick().await;
        }
        assert_eq!(finished, vec![key()]);
        assert_eq!(snapshot(&store).await.phase(), SessionPhase::Submitting);

        controller.submit(&key()).await.unwrap();
        let session = snapshot(&store).await;
        assert!(session.completed);
        assert_eq!(last_text(&session), "✅ Test submitted! Score: 12");
        assert_eq!(backend.submissions()[0].responses[4].answer, "");
    }

    #[tokio::test]
    async fn test_answer_disarms_countdown() {
        let (controller, store, _) = setup();
        start_at_first_bank_question(&controller).await;
        for _ in 0..5 {
            controller.tick().await;
        }
        controller.answer(&key(), "A UI library").await.unwrap();

        // Medium question now has a fresh 30s countdown, decremented once per tick.
        controller.tick().await;
        assert_eq!(snapshot(&store).await.time_left_seconds, Some(29));
    }

    #[tokio::test]
    async fn test_reupload_then_continue_preserves_state_exactly() {
        let (controller, store, _) = setup();
        start_at_first_bank_question(&controller).await;
        for _ in 0..7 {
            controller.tick().await;
        }
        let before = snapshot(&store).await;

        let view = controller
            .accept_resume(TEST_ID, profile(), "cv.pdf")
            .await
            .unwrap();
        assert_eq!(view.phase, SessionPhase::WelcomeBack);

        // Suspended: ticks no longer count down.
        controller.tick().await;
        assert_eq!(snapshot(&store).await.time_left_seconds, Some(13));

        let err = controller.answer(&key(), "too early").await.unwrap_err();
        assert!(matches!(err, SessionError::State(_)));

        let view = controller.continue_session(&key()).await.unwrap();
        assert_eq!(view.phase, SessionPhase::Answering);

        let after = snapshot(&store).await;
        assert_eq!(after.messages, before.messages);
        assert_eq!(after.questions, before.questions);
        assert_eq!(after.current_index, before.current_index);
        assert_eq!(after.profile, before.profile);
        assert_eq!(after.time_left_seconds, Some(13));

        controller.tick().await;
        assert_eq!(snapshot(&store).await.time_left_seconds, Some(12));
    }

    #[tokio::test]
    async fn test_recover_puts_open_sessions_behind_welcome_back() {
        let (controller, store, backend) = setup();
        start_at_first_bank_question(&controller).await;

        let restarted = SessionController::new(store.clone(), backend.clone());
        assert_eq!(restarted.recover().await.unwrap(), 1);
        assert_eq!(
            restarted.view(&key()).await.unwrap().phase,
            SessionPhase::WelcomeBack
        );

        restarted.continue_session(&key()).await.unwrap();
        for _ in 0..20 {
            restarted.tick().await;
        }
        assert_eq!(snapshot(&store).await.questions[3].answer.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_restart_clears_and_refetches_on_next_upload() {
        let (controller, store, backend) = setup();
        start_at_first_bank_question(&controller).await;

        let view = controller.restart(&key()).await.unwrap();
        assert_eq!(view.phase, SessionPhase::AwaitingResume);
        assert!(view.session.is_none());
        assert!(store.get(&key()).await.unwrap().is_none());
        assert!(controller.tick().await.is_empty());

        backend.push_fetch(Ok(definition(TEST_ID)));
        controller
            .accept_resume(TEST_ID, profile(), "new.pdf")
            .await
            .unwrap();
        let session = snapshot(&store).await;
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].text, "👋 Resume received: new.pdf");
        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_profile_ready_and_retry_succeeds() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(StubBackend::default());
        backend.push_fetch(Err(SessionError::Network("timed out".to_string())));
        let controller = SessionController::new(store.clone(), backend.clone());

        let err = controller
            .accept_resume(TEST_ID, profile(), "cv.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));
        let view = controller.view(&key()).await.unwrap();
        assert_eq!(view.phase, SessionPhase::ProfileReady);
        assert!(snapshot(&store).await.questions.is_empty());

        backend.push_fetch(Ok(definition(TEST_ID)));
        let view = controller.load_questions(&key()).await.unwrap();
        assert_eq!(view.phase, SessionPhase::Answering);

        // Never fetched again once loaded.
        controller.load_questions(&key()).await.unwrap();
        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_reupload_before_questions_loaded_stays_profile_ready() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(StubBackend::default());
        backend.push_fetch(Err(SessionError::Network("timed out".to_string())));
        let controller = SessionController::new(store.clone(), backend.clone());

        controller
            .accept_resume(TEST_ID, profile(), "cv.pdf")
            .await
            .unwrap_err();
        let view = controller
            .accept_resume(TEST_ID, profile(), "cv.pdf")
            .await
            .unwrap();

        assert_eq!(view.phase, SessionPhase::ProfileReady);
        assert_eq!(snapshot(&store).await.messages.len(), 1);
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_fully_known_profile_with_empty_bank_goes_straight_to_submission() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(StubBackend::serving(TestDefinition {
            questions: vec![],
            ..definition(TEST_ID)
        }));
        let controller = SessionController::new(store.clone(), backend.clone());

        let view = controller
            .accept_resume(
                TEST_ID,
                CandidateProfile {
                    phone: "555".to_string(),
                    ..profile()
                },
                "cv.pdf",
            )
            .await
            .unwrap();

        assert_eq!(view.phase, SessionPhase::Completed);
        assert_eq!(backend.submissions().len(), 1);
    }

    /// Holds every fetch until released.
    struct GatedBackend {
        gate: Notify,
        inner: StubBackend,
    }

    #[async_trait]
    impl TestBackend for GatedBackend {
        async fn fetch_test(&self, test_id: &str) -> Result<TestDefinition, SessionError> {
            self.gate.notified().await;
            self.inner.fetch_test(test_id).await
        }

        async fn submit(&self, submission: Submission) -> Result<f64, SessionError> {
            self.inner.submit(submission).await
        }
    }

    #[tokio::test]
    async fn test_fetch_result_for_restarted_session_is_discarded() {
        let store = Arc::new(InMemorySessionStore::new());
        let backend = Arc::new(GatedBackend {
            gate: Notify::new(),
            inner: StubBackend::serving(definition(TEST_ID)),
        });
        let controller = SessionController::new(store.clone(), backend.clone());

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.accept_resume(TEST_ID, profile(), "cv.pdf").await })
        };
        while controller.view(&key()).await.unwrap().phase != SessionPhase::QuestionsLoading {
            tokio::task::yield_now().await;
        }

        controller.restart(&key()).await.unwrap();
        backend.gate.notify_one();
        let view = pending.await.unwrap().unwrap();

        assert_eq!(view.phase, SessionPhase::AwaitingResume);
        assert!(store.get(&key()).await.unwrap().is_none());
    }

    /// Holds every countdown write until released; everything else passes through.
    struct SlowTimerStore {
        entered: Notify,
        gate: Notify,
        inner: InMemorySessionStore,
    }

    #[async_trait]
    impl SessionStore for SlowTimerStore {
        async fn create(&self, key: &SessionKey, email: &str) -> Result<(), StoreError> {
            self.inner.create(key, email).await
        }

        async fn get(&self, key: &SessionKey) -> Result<Option<CandidateSession>, StoreError> {
            self.inner.get(key).await
        }

        async fn append_message(
            &self,
            key: &SessionKey,
            message: ChatMessage,
        ) -> Result<(), StoreError> {
            self.inner.append_message(key, message).await
        }

        async fn set_questions(
            &self,
            key: &SessionKey,
            questions: Vec<QuestionSlot>,
        ) -> Result<(), StoreError> {
            self.inner.set_questions(key, questions).await
        }

        async fn write_answer(
            &self,
            key: &SessionKey,
            index: usize,
            text: &str,
        ) -> Result<(), StoreError> {
            self.inner.write_answer(key, index, text).await
        }

        async fn set_index(&self, key: &SessionKey, index: usize) -> Result<(), StoreError> {
            self.inner.set_index(key, index).await
        }

        async fn set_timer(&self, key: &SessionKey, update: TimerUpdate) -> Result<(), StoreError> {
            if update == TimerUpdate::Decrement {
                self.entered.notify_one();
                self.gate.notified().await;
            }
            self.inner.set_timer(key, update).await
        }

        async fn set_profile(
            &self,
            key: &SessionKey,
            profile: &CandidateProfile,
        ) -> Result<(), StoreError> {
            self.inner.set_profile(key, profile).await
        }

        async fn mark_uploaded(&self, key: &SessionKey) -> Result<(), StoreError> {
            self.inner.mark_uploaded(key).await
        }

        async fn mark_started(&self, key: &SessionKey, started: bool) -> Result<(), StoreError> {
            self.inner.mark_started(key, started).await
        }

        async fn mark_completed(&self, key: &SessionKey) -> Result<(), StoreError> {
            self.inner.mark_completed(key).await
        }

        async fn clear(&self, key: &SessionKey) -> Result<(), StoreError> {
            self.inner.clear(key).await
        }

        async fn open_keys(&self) -> Result<Vec<SessionKey>, StoreError> {
            self.inner.open_keys().await
        }
    }

    #[tokio::test]
    async fn test_slow_countdown_write_does_not_block_actions() {
        let store = Arc::new(SlowTimerStore {
            entered: Notify::new(),
            gate: Notify::new(),
            inner: InMemorySessionStore::new(),
        });
        let backend = Arc::new(StubBackend::serving(definition(TEST_ID)));
        let controller = SessionController::new(store.clone(), backend);
        start_at_first_bank_question(&controller).await;

        let ticking = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.tick().await })
        };
        store.entered.notified().await;

        let view = tokio::time::timeout(
            Duration::from_secs(1),
            controller.answer(&key(), "A UI library"),
        )
        .await
        .expect("answer waited on the countdown write")
        .unwrap();
        assert_eq!(view.session.unwrap().current_index, 4);

        store.gate.notify_one();
        assert!(ticking.await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_expires_questions_on_wall_clock() {
        let (controller, store, _) = setup();
        start_at_first_bank_question(&controller).await;

        let ticker = spawn_ticker(controller.clone());
        tokio::time::sleep(Duration::from_millis(20_500)).await;

        let session = snapshot(&store).await;
        assert_eq!(session.questions[3].answer.as_deref(), Some(""));
        assert_eq!(last_text(&session), "What is Axios?");
        assert_eq!(session.questions[4].question_type, QuestionType::Medium);
        ticker.abort();
    }
}
