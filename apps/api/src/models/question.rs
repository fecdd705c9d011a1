use serde::{Deserialize, Serialize};

/// Difficulty class of a question. `General` covers the untimed, unscored profile slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    #[serde(alias = "General")]
    General,
    Easy,
    Medium,
    Hard,
}

impl QuestionType {
    /// Case-insensitive lookup used at external boundaries.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "general" => Some(Self::General),
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// Maximum score declared to the reasoning service. `None` = not scored.
    pub fn max_score(&self) -> Option<u32> {
        match self {
            Self::General => None,
            Self::Easy => Some(20),
            Self::Medium => Some(30),
            Self::Hard => Some(40),
        }
    }

    /// Per-question countdown in seconds. `None` = untimed.
    pub fn time_limit_secs(&self) -> Option<u32> {
        match self {
            Self::General => None,
            Self::Easy => Some(20),
            Self::Medium => Some(30),
            Self::Hard => Some(40),
        }
    }

    pub fn is_scored(&self) -> bool {
        self.max_score().is_some()
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item of a test's question bank, in the wire shape shared with the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankQuestion {
    pub question_text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
}

/// A question paired with the candidate's answer, as submitted for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    #[serde(default)]
    pub answer: String,
}
