// All LLM prompt constants for resume extraction.

/// Resume contact extraction. Replace `{resume_text}` and `{json_only}` before sending.
pub const CONTACT_EXTRACTION_PROMPT: &str = r#"You are reading the plain text of a candidate's resume.
Find the candidate's full name, email address and phone number.

Rules:
- Copy values exactly as they appear; do not invent or guess.
- Use an empty string for any value that is not present.
- The phone number should contain digits only, with an optional leading "+".

Return a JSON object with exactly these keys:
{ "name": "...", "email": "...", "phone": "..." }

Resume text:
"""
{resume_text}
"""

{json_only}"#;
