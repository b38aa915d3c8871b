use serde::{Deserialize, Serialize};

use crate::analyzer::prompt::GenerationConfig;
use crate::error::AttemptFailure;

pub const FINISH_REASON_MAX_TOKENS: &str = "MAX_TOKENS";

//Request body for models/{model}:generateContent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestContent {
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPart {
    pub text: String,
}

impl GenerateContentRequest {
    pub fn new(prompt: impl Into<String>, generation_config: GenerationConfig) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.into(),
                }],
            }],
            generation_config,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    pub parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

/// Pulls `candidates[0].content.parts[0].text` out of a 200 body.
///
/// Every structural gap is a retryable `Malformed`, except a candidate that
/// stopped at `MAX_TOKENS` before producing any part.
pub fn extract_text(body: &str) -> Result<String, AttemptFailure> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| AttemptFailure::Malformed(format!("Invalid JSON envelope: {}", e)))?;

    let candidate = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .ok_or_else(|| AttemptFailure::Malformed("No candidates in response".into()))?;

    let truncated = candidate.finish_reason.as_deref() == Some(FINISH_REASON_MAX_TOKENS);

    let content = candidate
        .content
        .ok_or_else(|| AttemptFailure::Malformed("No content in response candidate".into()))?;

    let parts = match content.parts {
        Some(parts) if !parts.is_empty() => parts,
        _ if truncated => return Err(AttemptFailure::Truncated),
        Some(_) => return Err(AttemptFailure::Malformed("Empty parts array in response".into())),
        None => return Err(AttemptFailure::Malformed("No parts in response content".into())),
    };

    parts
        .into_iter()
        .next()
        .and_then(|part| part.text)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AttemptFailure::Malformed("Empty response text".into()))
}
