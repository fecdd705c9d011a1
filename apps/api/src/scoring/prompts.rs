// All LLM prompt constants for the Scoring module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Opening of the scoring instruction. Question blocks are appended after it.
pub const SCORING_PREAMBLE: &str = "\
Evaluate the candidate's answers strictly. You are a strict interviewer. Score each answer carefully:

- Score 0 to max (easy 20, medium 30, hard 40) based on correctness and completeness.
- Do NOT give full marks for one-line answers unless fully correct.
";

/// Closing of the scoring instruction.
pub const SCORING_REPLY_FORMAT: &str = "\
Return ONLY numeric scores for each question in JSON format like:
{\"React\": 20, \"Axios\": 30}
Do not include any text explanation or Markdown formatting.";

/// Question generation prompt. Replace `{count}`, `{roles}`, `{easy}`, `{medium}`
/// and `{json_only}` before sending.
pub const GENERATION_PROMPT_TEMPLATE: &str = r#"You are an expert technical interviewer.
Generate a JSON array of exactly {count} unique interview questions for the following roles: {roles}.
- The first {easy} should be "easy" type, the next {medium} "medium", and the rest "hard".
- Each question should be relevant to the roles, clear, and not repeated.
- Return ONLY a JSON array, each item: { "questionText": "...", "type": "easy|medium|hard" }
{json_only}"#;
