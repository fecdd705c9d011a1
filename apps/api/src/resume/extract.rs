use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{call_json, ReasoningService};
use crate::resume::prompts::CONTACT_EXTRACTION_PROMPT;
use crate::session::models::CandidateProfile;

/// Characters of resume text sent to the reasoning service. Contact details
/// sit at the top of a resume.
const MAX_PROMPT_CHARS: usize = 12_000;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported resume format '{0}'; upload a .pdf or .txt file")]
    UnsupportedFormat(String),

    #[error("could not read resume: {0}")]
    Unreadable(String),
}

/// Turns an uploaded document into `{name, email, phone}`.
/// Fields that cannot be found come back empty.
#[async_trait]
pub trait ResumeExtractor: Send + Sync {
    async fn extract(
        &self,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<CandidateProfile, ExtractionError>;
}

/// Reads document text locally, then asks the reasoning service for the contact triple.
#[derive(Clone)]
pub struct LlmResumeExtractor {
    llm: Arc<dyn ReasoningService>,
}

impl LlmResumeExtractor {
    pub fn new(llm: Arc<dyn ReasoningService>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ResumeExtractor for LlmResumeExtractor {
    async fn extract(
        &self,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<CandidateProfile, ExtractionError> {
        let text = document_text(file_name, bytes).await?;
        if text.trim().is_empty() {
            warn!("Resume '{file_name}' contains no extractable text");
            return Ok(CandidateProfile::default());
        }

        let prompt = build_extraction_prompt(&text);
        match call_json::<CandidateProfile>(self.llm.as_ref(), &prompt).await {
            Ok(profile) => {
                let profile = profile.normalized();
                info!(
                    "Extracted resume '{file_name}': name={}, email={}, phone={}",
                    !profile.name.is_empty(),
                    !profile.email.is_empty(),
                    !profile.phone.is_empty()
                );
                Ok(profile)
            }
            Err(e) => {
                warn!("Resume extraction for '{file_name}' failed, using empty profile: {e}");
                Ok(CandidateProfile::default())
            }
        }
    }
}

/// Lower-cased extension of an upload name.
fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Plain text of a `.pdf` or `.txt` upload.
pub async fn document_text(file_name: &str, bytes: Bytes) -> Result<String, ExtractionError> {
    match extension(file_name).as_str() {
        "txt" => String::from_utf8(bytes.to_vec())
            .map_err(|e| ExtractionError::Unreadable(format!("text file is not UTF-8: {e}"))),
        "pdf" => {
            // pdf parsing is CPU-bound; keep it off the async executor.
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| ExtractionError::Unreadable(format!("pdf parser aborted: {e}")))?
                .map_err(|e| ExtractionError::Unreadable(e.to_string()))
        }
        other => Err(ExtractionError::UnsupportedFormat(other.to_string())),
    }
}

pub fn build_extraction_prompt(text: &str) -> String {
    let text: String = text.trim().chars().take(MAX_PROMPT_CHARS).collect();
    CONTACT_EXTRACTION_PROMPT
        .replace("{resume_text}", &text)
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
}
