//! Recovers a verdict from whatever text the model sent back.
//!
//! Stages run in order and the first one that yields a verdict wins:
//! direct parse, object extraction, truncation repair. The keyword heuristic
//! at the end always answers, so decoding only fails on an out-of-range score.

use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use serde_json::{Map, Value};

use crate::analyzer::sentiment::{SentimentLabel, SentimentResult};
use crate::error::AnalysisError;

pub const DEFAULT_CONFIDENCE: f64 = 0.95;
pub const DEFAULT_EXPLANATION: &str = "Sentiment analysis completed";
pub const DEFAULT_LANGUAGE: &str = "en";

pub const INFERRED_CONFIDENCE: f64 = 0.7;
pub const INFERRED_EXPLANATION: &str = "Sentiment inferred from response text";

const SCORE_KEY: &str = "\"sentiment_score\"";

/// `None` means the stage could not read the text and the next one should try.
type Stage = fn(&str) -> Option<Result<SentimentResult, AnalysisError>>;

const STAGES: [(&str, Stage); 3] = [
    ("direct parse", parse_direct),
    ("object extraction", parse_extracted),
    ("truncation repair", parse_repaired),
];

const VERY_POSITIVE_WORDS: &[&str] = &["very positive", "excellent", "amazing", "fantastic"];
const POSITIVE_WORDS: &[&str] = &["positive", "good", "great", "happy"];
const NEUTRAL_WORDS: &[&str] = &["neutral", "factual", "informational"];
const NEGATIVE_WORDS: &[&str] = &["negative", "bad", "poor", "disappointing"];
const VERY_NEGATIVE_WORDS: &[&str] = &["very negative", "terrible", "awful", "hate"];

/// Keyword groups in precedence order. First group with any hit decides.
const KEYWORD_SCORES: [(&[&str], u8); 5] = [
    (VERY_POSITIVE_WORDS, 5),
    (POSITIVE_WORDS, 4),
    (NEUTRAL_WORDS, 3),
    (NEGATIVE_WORDS, 2),
    (VERY_NEGATIVE_WORDS, 1),
];

pub struct ResponseDecoder;

impl ResponseDecoder {
    pub fn decode(
        raw_text: &str,
        requested_language: &str,
    ) -> Result<SentimentResult, AnalysisError> {
        let cleaned = clean(raw_text);

        for (name, stage) in STAGES {
            match stage(cleaned) {
                Some(outcome) => {
                    debug!("Decoded model reply via {}", name);
                    return outcome;
                }
                None => debug!("Decode stage '{}' did not apply", name),
            }
        }

        warn!("Could not parse model reply as JSON, inferring sentiment from text");
        debug!("Unparsed model reply: {}", preview(cleaned));
        Ok(infer_from_text(raw_text, requested_language))
    }
}

/// Strips a leading ```json (or bare ```) fence, a trailing ``` fence and
/// surrounding whitespace.
pub fn clean(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    text = text.trim();
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn parse_direct(text: &str) -> Option<Result<SentimentResult, AnalysisError>> {
    let value = serde_json::from_str::<Value>(text).ok()?;
    build_result(value.as_object()?)
}

fn parse_extracted(text: &str) -> Option<Result<SentimentResult, AnalysisError>> {
    static OBJECT_WITH_SCORE: OnceLock<Regex> = OnceLock::new();
    let pattern = OBJECT_WITH_SCORE.get_or_init(|| {
        Regex::new(r#"\{[^{}]*"sentiment_score"[^{}]*\}"#).expect("static pattern compiles")
    });

    let candidate = pattern.find(text)?.as_str();
    parse_direct(candidate)
}

fn parse_repaired(text: &str) -> Option<Result<SentimentResult, AnalysisError>> {
    if !looks_truncated(text) {
        return None;
    }
    let repaired = repair_truncated(text);
    debug!("Repaired truncated reply: {}", preview(&repaired));
    parse_direct(&repaired)
}

pub fn looks_truncated(text: &str) -> bool {
    let text = text.trim();
    text.starts_with('{') && !text.ends_with('}') && text.contains(SCORE_KEY)
}

/// Closes a reply cut off mid-object, completing a dangling value with the
/// default confidence.
pub fn repair_truncated(text: &str) -> String {
    let mut text = text.trim().to_string();

    // Trimmed above, so a dangling `": ` already lands in the first arm; the
    // `: ` arm stays second to keep the repair order fixed.
    if text.ends_with("\":") {
        text.push_str(" 0.95");
    } else if text.ends_with(": ") {
        text.push_str("0.95");
    } else if text.ends_with(',') {
        text.pop();
    }

    if !text.ends_with('}') {
        text.push('}');
    }
    text
}

/// Builds a verdict from a parsed object. `None` when the score is absent or
/// not an integer; an integer score outside 1..=5 is a hard error.
fn build_result(data: &Map<String, Value>) -> Option<Result<SentimentResult, AnalysisError>> {
    let score = read_integer(data.get("sentiment_score")?)?;
    if !(1..=5).contains(&score) {
        return Some(Err(AnalysisError::InvalidScore(score)));
    }
    let score = score as u8;

    let label = data
        .get("sentiment_label")
        .and_then(Value::as_str)
        .and_then(SentimentLabel::parse);
    let confidence = data
        .get("confidence")
        .and_then(read_float)
        .unwrap_or(DEFAULT_CONFIDENCE);
    let explanation = data
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_EXPLANATION);
    let language = data
        .get("language_detected")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_LANGUAGE);

    SentimentResult::new(score, label, confidence, explanation, language).map(Ok)
}

fn read_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Last resort: keyword scan over the reply. Never fails.
pub fn infer_from_text(text: &str, requested_language: &str) -> SentimentResult {
    let lowered = text.to_lowercase();
    let score = KEYWORD_SCORES
        .iter()
        .find(|(words, _)| words.iter().any(|w| lowered.contains(w)))
        .map(|(_, score)| *score)
        .unwrap_or(3);

    let language = if requested_language == "auto" {
        DEFAULT_LANGUAGE
    } else {
        requested_language
    };

    SentimentResult {
        sentiment_score: score,
        sentiment_label: SentimentLabel::from_score(score).unwrap_or(SentimentLabel::Neutral),
        confidence: INFERRED_CONFIDENCE,
        explanation: INFERRED_EXPLANATION.to_string(),
        language_detected: language.to_string(),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}
