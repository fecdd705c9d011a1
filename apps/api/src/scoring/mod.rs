// Scoring pipeline: answer scoring and question generation.
// All LLM calls go through llm_client::ReasoningService.

pub mod generation;
pub mod pipeline;
pub mod prompts;

pub use generation::GenerationError;
pub use pipeline::ScoringPipeline;
