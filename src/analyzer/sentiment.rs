use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

/// Five-point sentiment scale, 1 (Very Negative) to 5 (Very Positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "Very Negative")]
    VeryNegative,
    Negative,
    Neutral,
    Positive,
    #[serde(rename = "Very Positive")]
    VeryPositive,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 5] = [
        SentimentLabel::VeryNegative,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
        SentimentLabel::Positive,
        SentimentLabel::VeryPositive,
    ];

    /// Table lookup for a score; `None` outside 1..=5.
    pub fn from_score(score: u8) -> Option<Self> {
        match score {
            1 => Some(SentimentLabel::VeryNegative),
            2 => Some(SentimentLabel::Negative),
            3 => Some(SentimentLabel::Neutral),
            4 => Some(SentimentLabel::Positive),
            5 => Some(SentimentLabel::VeryPositive),
            _ => None,
        }
    }

    pub fn score(self) -> u8 {
        match self {
            SentimentLabel::VeryNegative => 1,
            SentimentLabel::Negative => 2,
            SentimentLabel::Neutral => 3,
            SentimentLabel::Positive => 4,
            SentimentLabel::VeryPositive => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::VeryNegative => "Very Negative",
            SentimentLabel::Negative => "Negative",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Positive => "Positive",
            SentimentLabel::VeryPositive => "Very Positive",
        }
    }

    /// Case-insensitive match against the display names.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated verdict. Immutable once built; elapsed time travels separately
/// in [`TimedSentiment`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    pub sentiment_score: u8,
    pub sentiment_label: SentimentLabel,
    pub confidence: f64,
    pub explanation: String,
    pub language_detected: String,
}

impl SentimentResult {
    /// `score` must already be in 1..=5; out-of-range input yields `None`.
    pub fn new(
        score: u8,
        label: Option<SentimentLabel>,
        confidence: f64,
        explanation: impl Into<String>,
        language_detected: impl Into<String>,
    ) -> Option<Self> {
        let table_label = SentimentLabel::from_score(score)?;
        Some(Self {
            sentiment_score: score,
            sentiment_label: label.unwrap_or(table_label),
            confidence: confidence.clamp(0.0, 1.0),
            explanation: explanation.into(),
            language_detected: language_detected.into(),
        })
    }
}

/// A verdict paired with the wall time the whole analysis took.
#[derive(Debug, Clone, Serialize)]
pub struct TimedSentiment {
    #[serde(flatten)]
    pub result: SentimentResult,
    #[serde(rename = "processing_time_ms", serialize_with = "serialize_millis")]
    pub processing_time: Duration,
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let ms = duration.as_secs_f64() * 1000.0;
    serializer.serialize_f64((ms * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_label_table_both_ways() {
        for score in 1..=5u8 {
            let label = SentimentLabel::from_score(score).unwrap();
            assert_eq!(label.score(), score);
        }
        assert_eq!(SentimentLabel::from_score(0), None);
        assert_eq!(SentimentLabel::from_score(6), None);
        assert_eq!(SentimentLabel::from_score(1), Some(SentimentLabel::VeryNegative));
        assert_eq!(SentimentLabel::from_score(5), Some(SentimentLabel::VeryPositive));
    }

    #[test]
    fn test_label_parse_is_case_insensitive() {
        assert_eq!(
            SentimentLabel::parse(" very positive "),
            Some(SentimentLabel::VeryPositive)
        );
        assert_eq!(SentimentLabel::parse("NEUTRAL"), Some(SentimentLabel::Neutral));
        assert_eq!(SentimentLabel::parse("mixed"), None);
    }

    #[test]
    fn test_result_clamps_confidence() {
        let result = SentimentResult::new(4, None, 1.7, "ok", "en").unwrap();
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.sentiment_label, SentimentLabel::Positive);
        assert!(SentimentResult::new(0, None, 0.5, "ok", "en").is_none());
    }

    #[test]
    fn test_timed_sentiment_serializes_flat_with_millis() {
        let timed = TimedSentiment {
            result: SentimentResult::new(2, None, 0.8, "meh", "ja").unwrap(),
            processing_time: Duration::from_micros(1_234_567),
        };
        let json = serde_json::to_value(&timed).unwrap();
        assert_eq!(json["sentiment_score"], 2);
        assert_eq!(json["sentiment_label"], "Negative");
        assert_eq!(json["language_detected"], "ja");
        assert_eq!(json["processing_time_ms"], 1234.6);
    }
}
