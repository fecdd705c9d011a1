//! Answer scoring — builds one instruction, asks the reasoning service for
//! per-question scores, and sums them.
//!
//! `score` never fails: any network, service or parse problem degrades to 0 so
//! a submission is never blocked by scoring.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{info, warn};

use crate::llm_client::{call_json, ReasoningService};
use crate::models::question::{AnswerRecord, BankQuestion, QuestionType};
use crate::scoring::prompts::{SCORING_PREAMBLE, SCORING_REPLY_FORMAT};

/// Scoring and generation front for the reasoning service.
#[derive(Clone)]
pub struct ScoringPipeline {
    pub(crate) llm: Arc<dyn ReasoningService>,
}

/// An answered question that takes part in scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorableAnswer<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub question_type: QuestionType,
}

impl ScoringPipeline {
    pub fn new(llm: Arc<dyn ReasoningService>) -> Self {
        Self { llm }
    }

    /// Scores a submission against the test's question bank.
    ///
    /// Steps:
    /// 1. keep answered questions whose text is a scored (non-general) bank question
    /// 2. build one instruction with per-type maxima declared once
    /// 3. one reasoning-service call, no retry
    /// 4. strip fences and parse a flat `label -> number` map
    /// 5. sum the values (no clamping to the declared maxima)
    pub async fn score(&self, answers: &[AnswerRecord], bank: &[BankQuestion]) -> f64 {
        let lookup = type_lookup(bank);
        let scorable = select_scorable(answers, &lookup);

        if scorable.is_empty() {
            info!("No scorable answers in submission; score is 0");
            return 0.0;
        }

        let prompt = build_scoring_prompt(&scorable);

        match call_json::<BTreeMap<String, f64>>(self.llm.as_ref(), &prompt).await {
            Ok(scores) => {
                let total = aggregate(&scores);
                info!(
                    "Scored {} answers across {} labels: total={total}",
                    scorable.len(),
                    scores.len()
                );
                total
            }
            Err(e) => {
                warn!("Scoring failed, recording 0: {e}");
                0.0
            }
        }
    }
}

/// Maps question text to its type. The first occurrence wins on duplicate text.
pub fn type_lookup(bank: &[BankQuestion]) -> HashMap<&str, QuestionType> {
    let mut lookup = HashMap::with_capacity(bank.len());
    for q in bank {
        lookup
            .entry(q.question_text.as_str())
            .or_insert(q.question_type);
    }
    lookup
}

/// Answered questions with a known, scored type, in submission order.
pub fn select_scorable<'a>(
    answers: &'a [AnswerRecord],
    lookup: &HashMap<&str, QuestionType>,
) -> Vec<ScorableAnswer<'a>> {
    answers
        .iter()
        .filter(|a| !a.answer.trim().is_empty())
        .filter_map(|a| {
            let question_type = *lookup.get(a.question.as_str())?;
            question_type.is_scored().then_some(ScorableAnswer {
                question: &a.question,
                answer: &a.answer,
                question_type,
            })
        })
        .collect()
}

/// Builds the scoring instruction. Each distinct type's maximum is declared once,
/// in order of first appearance, ahead of the question/answer pairs.
pub fn build_scoring_prompt(scorable: &[ScorableAnswer<'_>]) -> String {
    let mut prompt = String::from(SCORING_PREAMBLE);

    let mut declared: Vec<QuestionType> = Vec::new();
    for item in scorable {
        if !declared.contains(&item.question_type) {
            declared.push(item.question_type);
        }
    }

    prompt.push('\n');
    for question_type in &declared {
        if let Some(max) = question_type.max_score() {
            let _ = writeln!(prompt, "Maximum score for {question_type} questions: {max}");
        }
    }
    prompt.push('\n');

    for item in scorable {
        let _ = writeln!(
            prompt,
            "Question: {}\nAnswer: {}\nType: {}\n",
            item.question, item.answer, item.question_type
        );
    }

    prompt.push_str(SCORING_REPLY_FORMAT);
    prompt
}

/// Sum of every parsed score.
pub fn aggregate(scores: &BTreeMap<String, f64>) -> f64 {
    scores.values().sum()
}
