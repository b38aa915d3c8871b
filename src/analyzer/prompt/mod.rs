use serde::Serialize;

use crate::analyzer::AnalysisRequest;

const JAPANESE_CONTEXT: &str = "Consider Japanese cultural context:
- Indirect communication styles (honne vs tatemae)
- Honorific language and politeness levels
- Context-dependent meaning
- Emotional restraint in expression";

const KOREAN_CONTEXT: &str = "Consider Korean cultural context:
- Hierarchical communication patterns
- Honorific language systems
- Indirect expression of emotions";

const CHINESE_CONTEXT: &str = "Consider Chinese cultural context:
- Concept of face (mianzi) in communication
- Indirect communication styles
- Contextual meaning interpretation";

const ENGLISH_CONTEXT: &str = "Consider English communication patterns:
- Direct communication style
- Sarcasm and irony detection
- Professional vs casual contexts";

const SENTIMENT_SCALE: &str = "Sentiment Scale:
1 = Very Negative (anger, hostility, severe criticism)
2 = Negative (disappointment, mild criticism, concern)
3 = Neutral (factual, informational, balanced)
4 = Positive (satisfaction, approval, mild enthusiasm)
5 = Very Positive (excitement, joy, strong approval, celebration)";

const OUTPUT_SCHEMA: &str = r#"Respond with ONLY this JSON format (no markdown, no explanation outside JSON):
{
    "sentiment_score": [integer 1-5],
    "sentiment_label": "[Very Negative|Negative|Neutral|Positive|Very Positive]",
    "confidence": [float 0.0-1.0],
    "language_detected": "[2-letter language code]",
    "explanation": "[brief explanation in English]"
}"#;

pub const DEFAULT_CONTEXT: &str = "General communication";

/// Sampling parameters sent with every prompt. Fixed by the protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub stop_sequences: Vec<String>,
    pub candidate_count: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            top_k: 20,
            max_output_tokens: 1024,
            stop_sequences: Vec::new(),
            candidate_count: 1,
        }
    }
}

/// Instruction block for a 2-letter language code. `auto` and anything
/// unrecognised get the English block.
pub fn cultural_context(language: &str) -> &'static str {
    match language {
        "ja" => JAPANESE_CONTEXT,
        "ko" => KOREAN_CONTEXT,
        "zh" => CHINESE_CONTEXT,
        _ => ENGLISH_CONTEXT,
    }
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Renders the full prompt for one request. Pure.
    pub fn build(request: &AnalysisRequest) -> String {
        let context = request.context.as_deref().unwrap_or(DEFAULT_CONTEXT);

        format!(
            "You are a sentiment analysis expert. Analyze the sentiment of the following text and respond with ONLY a valid JSON object.\n\
             \n\
             Text: \"{text}\"\n\
             Language: {language}\n\
             Context: {context}\n\
             \n\
             {culture}\n\
             \n\
             {scale}\n\
             \n\
             {schema}",
            text = request.text,
            language = request.language,
            context = context,
            culture = cultural_context(&request.language),
            scale = SENTIMENT_SCALE,
            schema = OUTPUT_SCHEMA,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str, language: &str, context: Option<&str>) -> AnalysisRequest {
        AnalysisRequest {
            text: text.to_string(),
            language: language.to_string(),
            context: context.map(str::to_string),
            channel_type: "web".to_string(),
        }
    }

    #[test]
    fn test_prompt_embeds_text_verbatim() {
        let prompt = PromptBuilder::build(&request(r#"He said "wow" \o/"#, "en", None));
        assert!(prompt.contains(r#"Text: "He said "wow" \o/""#));
        assert!(prompt.contains("Language: en"));
        assert!(prompt.contains("Context: General communication"));
    }

    #[test]
    fn test_prompt_uses_given_context() {
        let prompt = PromptBuilder::build(&request("hi", "en", Some("user feedback")));
        assert!(prompt.contains("Context: user feedback"));
        assert!(!prompt.contains(DEFAULT_CONTEXT));
    }

    #[test]
    fn test_cultural_block_selection() {
        assert!(PromptBuilder::build(&request("x", "ja", None)).contains("honne vs tatemae"));
        assert!(PromptBuilder::build(&request("x", "ko", None)).contains("Hierarchical"));
        assert!(PromptBuilder::build(&request("x", "zh", None)).contains("mianzi"));

        let auto = PromptBuilder::build(&request("x", "auto", None));
        assert!(auto.contains("Sarcasm and irony detection"));
        assert!(auto.contains("Language: auto"));

        let unknown = PromptBuilder::build(&request("x", "fr", None));
        assert!(unknown.contains("Consider English communication patterns"));
    }

    #[test]
    fn test_prompt_carries_scale_and_schema() {
        let prompt = PromptBuilder::build(&request("x", "en", None));
        assert!(prompt.contains("3 = Neutral (factual, informational, balanced)"));
        assert!(prompt.contains("Respond with ONLY this JSON format"));
        for key in [
            "sentiment_score",
            "sentiment_label",
            "confidence",
            "language_detected",
            "explanation",
        ] {
            assert!(prompt.contains(&format!("\"{}\"", key)), "missing {}", key);
        }
    }

    #[test]
    fn test_generation_config_wire_names() {
        let json = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(json["temperature"], 0.1);
        assert_eq!(json["topP"], 0.9);
        assert_eq!(json["topK"], 20);
        assert_eq!(json["maxOutputTokens"], 1024);
        assert_eq!(json["stopSequences"], serde_json::json!([]));
        assert_eq!(json["candidateCount"], 1);
    }
}
