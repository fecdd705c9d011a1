// Resume upload → candidate contact details.
// Only the output contract matters to the session flow; extraction is best-effort.

pub mod extract;
pub mod prompts;

pub use extract::{ExtractionError, LlmResumeExtractor, ResumeExtractor};
