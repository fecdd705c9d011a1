//! Question generation for test authors.
//!
//! One reasoning-service call per request. The reply is filtered down to
//! well-formed items and trimmed to the requested count; a short reply is
//! returned short rather than padded.

use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{call_json, LlmError};
use crate::models::question::QuestionType;
use crate::scoring::pipeline::ScoringPipeline;
use crate::scoring::prompts::GENERATION_PROMPT_TEMPLATE;
use crate::session::models::QuestionSlot;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// How many questions of each difficulty to request for a test of `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultySplit {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

/// `easy = medium = min(2, max(1, n / 3))`, `hard` takes the remainder.
/// Below three questions the bands fill in order, so the split always sums to `n`.
pub fn difficulty_split(n: usize) -> DifficultySplit {
    let per_band = (n / 3).max(1).min(2);
    let easy = per_band.min(n);
    let medium = per_band.min(n - easy);
    DifficultySplit {
        easy,
        medium,
        hard: n - easy - medium,
    }
}

pub fn build_generation_prompt(roles: &[String], count: usize) -> String {
    let split = difficulty_split(count);
    GENERATION_PROMPT_TEMPLATE
        .replace("{count}", &count.to_string())
        .replace("{roles}", &roles.join(", "))
        .replace("{easy}", &split.easy.to_string())
        .replace("{medium}", &split.medium.to_string())
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
}

/// Exact difficulty labels only; anything else, including `general`, is discarded.
fn generated_type(label: &str) -> Option<QuestionType> {
    match label {
        "easy" => Some(QuestionType::Easy),
        "medium" => Some(QuestionType::Medium),
        "hard" => Some(QuestionType::Hard),
        _ => None,
    }
}

/// Keeps items with non-empty text and an exact difficulty label, in reply
/// order, at most `count` of them.
pub fn filter_generated(items: Vec<serde_json::Value>, count: usize) -> Vec<QuestionSlot> {
    items
        .iter()
        .filter_map(|item| {
            let text = item.get("questionText")?.as_str()?.trim();
            if text.is_empty() {
                return None;
            }
            let question_type = generated_type(item.get("type")?.as_str()?)?;
            Some(QuestionSlot::new(text, question_type))
        })
        .take(count)
        .collect()
}

impl ScoringPipeline {
    /// Produces up to `count` difficulty-tagged questions for the given roles.
    pub async fn generate(
        &self,
        roles: &[String],
        count: usize,
    ) -> Result<Vec<QuestionSlot>, GenerationError> {
        let roles: Vec<String> = roles
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        if roles.is_empty() {
            return Err(GenerationError::Validation(
                "at least one role is required".to_string(),
            ));
        }
        if count == 0 {
            return Err(GenerationError::Validation(
                "numberOfQuestions must be at least 1".to_string(),
            ));
        }

        let prompt = build_generation_prompt(&roles, count);
        let items: Vec<serde_json::Value> = call_json(self.llm.as_ref(), &prompt).await?;
        let received = items.len();
        let slots = filter_generated(items, count);

        if slots.len() < count {
            warn!(
                "Generation returned {} usable questions of {count} requested ({received} raw items)",
                slots.len()
            );
        } else {
            info!("Generated {count} questions for roles [{}]", roles.join(", "));
        }

        Ok(slots)
    }
}
