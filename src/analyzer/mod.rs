use std::time::Instant;

use anyhow::Result;
use log::{error, info};
use serde::Deserialize;

use crate::config::GeminiConfig;
use crate::error::AnalysisError;
use crate::gemini::GeminiClient;

use self::decoder::ResponseDecoder;
use self::prompt::{GenerationConfig, PromptBuilder};
use self::sentiment::TimedSentiment;

pub mod decoder;
pub mod prompt;
pub mod sentiment;

pub const MAX_TEXT_CHARS: usize = 10_000;

fn default_language() -> String {
    "auto".to_string()
}

fn default_channel() -> String {
    "web".to_string()
}

/// One piece of text to classify. Length limits are the caller's job.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub text: String,
    /// 2-letter code, or `auto`
    #[serde(default = "default_language")]
    pub language: String,
    pub context: Option<String>,
    #[serde(default = "default_channel")]
    pub channel_type: String,
}

impl AnalysisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: default_language(),
            context: None,
            channel_type: default_channel(),
        }
    }
}

/// Prompt -> model -> decode, timed end to end.
pub struct SentimentAnalyzer {
    client: GeminiClient,
    generation_config: GenerationConfig,
}

impl SentimentAnalyzer {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        Ok(Self::with_client(GeminiClient::new(config)?))
    }

    pub fn with_client(client: GeminiClient) -> Self {
        Self {
            client,
            generation_config: GenerationConfig::default(),
        }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<TimedSentiment, AnalysisError> {
        let started = Instant::now();
        info!(
            "Starting sentiment analysis (language: {}, channel: {})",
            request.language, request.channel_type
        );

        let outcome = self.run(request).await;
        let processing_time = started.elapsed();

        match outcome {
            Ok(result) => {
                info!(
                    "Sentiment analysis completed: {} ({}/5) in {:.2}s",
                    result.sentiment_label,
                    result.sentiment_score,
                    processing_time.as_secs_f64()
                );
                Ok(TimedSentiment {
                    result,
                    processing_time,
                })
            }
            Err(e) => {
                error!("Sentiment analysis failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
    ) -> Result<sentiment::SentimentResult, AnalysisError> {
        let prompt = PromptBuilder::build(request);
        let raw_text = self.client.send(&prompt, &self.generation_config).await?;
        ResponseDecoder::decode(&raw_text, &request.language)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::sentiment::SentimentLabel;
    use super::*;
    use crate::gemini::testing::{ok_reply, status_reply, timeout, RecordingPause, ScriptedEndpoint};

    fn analyzer(script: Vec<std::result::Result<crate::gemini::HttpReply, String>>) -> SentimentAnalyzer {
        let client = GeminiClient::with_parts(
            Arc::new(ScriptedEndpoint::new(script)),
            Arc::new(RecordingPause::default()),
            3,
        );
        SentimentAnalyzer::with_client(client)
    }

    #[tokio::test]
    async fn test_analyze_decodes_model_reply() {
        let analyzer = analyzer(vec![ok_reply(
            r#"{"sentiment_score": 5, "sentiment_label": "Very Positive", "confidence": 0.97, "language_detected": "en", "explanation": "Pure joy"}"#,
        )]);

        let mut request = AnalysisRequest::new("I absolutely love this new feature!");
        request.context = Some("user feedback".into());

        let timed = analyzer.analyze(&request).await.unwrap();
        assert_eq!(timed.result.sentiment_score, 5);
        assert_eq!(timed.result.sentiment_label, SentimentLabel::VeryPositive);
        assert_eq!(timed.result.explanation, "Pure joy");
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_prose_reply() {
        let analyzer = analyzer(vec![
            timeout(),
            ok_reply("The tone here is awful and hostile."),
        ]);
        let mut request = AnalysisRequest::new("...");
        request.language = "ja".into();

        let timed = analyzer.analyze(&request).await.unwrap();
        assert_eq!(timed.result.sentiment_score, 1);
        assert_eq!(timed.result.confidence, decoder::INFERRED_CONFIDENCE);
        assert_eq!(timed.result.language_detected, "ja");
    }

    #[tokio::test]
    async fn test_analyze_surfaces_invalid_score() {
        let analyzer = analyzer(vec![ok_reply(r#"{"sentiment_score": 7}"#)]);
        let err = analyzer
            .analyze(&AnalysisRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidScore(7)));
    }

    #[tokio::test]
    async fn test_analyze_surfaces_exhausted_retries() {
        let analyzer = analyzer(vec![
            status_reply(500, None, "a"),
            status_reply(500, None, "b"),
            status_reply(500, None, "c"),
        ]);
        let err = analyzer
            .analyze(&AnalysisRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::UpstreamStatus { attempts: 3, .. }
        ));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: AnalysisRequest = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert_eq!(request.language, "auto");
        assert_eq!(request.context, None);
        assert_eq!(request.channel_type, "web");
    }
}
