use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::{AnswerRecord, BankQuestion, QuestionType};
use crate::session::SessionError;

/// Handle for one candidate's attempt at one test: `testID + "_" + email`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    test_id: String,
    email: String,
}

impl SessionKey {
    /// Builds a key, refusing blank parts so an empty key never indexes a session.
    pub fn new(test_id: &str, email: &str) -> Result<Self, SessionError> {
        let test_id = test_id.trim();
        let email = email.trim();
        if test_id.is_empty() {
            return Err(SessionError::Validation("test id is required".to_string()));
        }
        if email.is_empty() {
            return Err(SessionError::Validation(
                "an email address is required to start a session".to_string(),
            ));
        }
        Ok(Self {
            test_id: test_id.to_string(),
            email: email.to_string(),
        })
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.test_id, self.email)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Bot,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }
}

/// One question plus its answer state. `answer == None` means unanswered;
/// `Some("")` is an answer recorded empty because the countdown ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSlot {
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub answer: Option<String>,
}

impl QuestionSlot {
    pub fn new(text: impl Into<String>, question_type: QuestionType) -> Self {
        Self {
            text: text.into(),
            question_type,
            answer: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.answer.is_none()
    }
}

impl From<BankQuestion> for QuestionSlot {
    fn from(q: BankQuestion) -> Self {
        Self::new(q.question_text, q.question_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl CandidateProfile {
    /// Trims every field; extraction is best-effort and may pad values.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

pub const NAME_PROMPT: &str = "Name?";
pub const EMAIL_PROMPT: &str = "Email?";
pub const PHONE_PROMPT: &str = "Phone?";

/// The three fixed profile slots that open every question list.
/// A field already known from the resume is pre-answered so it is never asked.
pub fn profile_slots(profile: &CandidateProfile) -> Vec<QuestionSlot> {
    [
        (NAME_PROMPT, &profile.name),
        (EMAIL_PROMPT, &profile.email),
        (PHONE_PROMPT, &profile.phone),
    ]
    .into_iter()
    .map(|(prompt, value)| QuestionSlot {
        text: prompt.to_string(),
        question_type: QuestionType::General,
        answer: (!value.is_empty()).then(|| value.clone()),
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    AwaitingResume,
    ProfileReady,
    QuestionsLoading,
    WelcomeBack,
    Answering,
    Submitting,
    Completed,
}

/// Durable per-candidate snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSession {
    pub attempt_id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub questions: Vec<QuestionSlot>,
    pub current_index: usize,
    pub time_left_seconds: Option<u32>,
    pub profile: CandidateProfile,
    pub resume_uploaded: bool,
    pub chat_started: bool,
    pub completed: bool,
}

impl CandidateSession {
    pub fn new(email: &str) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            messages: Vec::new(),
            questions: Vec::new(),
            current_index: 0,
            time_left_seconds: None,
            profile: CandidateProfile {
                email: email.to_string(),
                ..Default::default()
            },
            resume_uploaded: false,
            chat_started: false,
            completed: false,
        }
    }

    /// First unanswered slot, or `questions.len()` when every slot is answered.
    pub fn first_pending(&self) -> usize {
        self.questions
            .iter()
            .position(QuestionSlot::is_pending)
            .unwrap_or(self.questions.len())
    }

    pub fn current_slot(&self) -> Option<&QuestionSlot> {
        self.questions
            .get(self.current_index)
            .filter(|slot| slot.is_pending())
    }

    /// Phase as far as the snapshot alone can tell. In-flight question fetches
    /// are only known to the controller, which refines `ProfileReady`.
    pub fn phase(&self) -> SessionPhase {
        if self.completed {
            SessionPhase::Completed
        } else if !self.resume_uploaded {
            SessionPhase::AwaitingResume
        } else if self.questions.is_empty() {
            SessionPhase::ProfileReady
        } else if !self.chat_started && !self.messages.is_empty() {
            SessionPhase::WelcomeBack
        } else if self.first_pending() >= self.questions.len() {
            SessionPhase::Submitting
        } else {
            SessionPhase::Answering
        }
    }

    /// Ordered answer list, profile slots included. Unanswered slots submit as empty.
    pub fn answers(&self) -> Vec<AnswerRecord> {
        self.questions
            .iter()
            .map(|q| AnswerRecord {
                question: q.text.clone(),
                answer: q.answer.clone().unwrap_or_default(),
            })
            .collect()
    }

    /// Name for the response record: the extracted one, else the answer to "Name?".
    pub fn candidate_name(&self) -> String {
        if !self.profile.name.is_empty() {
            return self.profile.name.clone();
        }
        self.questions
            .iter()
            .find(|q| q.text == NAME_PROMPT)
            .and_then(|q| q.answer.clone())
            .unwrap_or_default()
    }

    pub fn candidate_phone(&self) -> String {
        if !self.profile.phone.is_empty() {
            return self.profile.phone.clone();
        }
        self.questions
            .iter()
            .find(|q| q.text == PHONE_PROMPT)
            .and_then(|q| q.answer.clone())
            .unwrap_or_default()
    }
}

/// What the HTTP layer returns for a session key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_key: String,
    pub phase: SessionPhase,
    #[serde(flatten)]
    pub session: Option<CandidateSession>,
}

impl SessionView {
    pub fn awaiting_resume(key: &SessionKey) -> Self {
        Self {
            session_key: key.to_string(),
            phase: SessionPhase::AwaitingResume,
            session: None,
        }
    }
}
