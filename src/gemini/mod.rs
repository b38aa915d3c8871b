use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};

use crate::analyzer::prompt::GenerationConfig;
use crate::config::GeminiConfig;
use crate::error::{AnalysisError, AttemptFailure};
use crate::gemini::envelope::GenerateContentRequest;

pub mod envelope;

const MAX_BACKOFF_SECS: u64 = 60;
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const BODY_PREVIEW_CHARS: usize = 500;

/// Raw HTTP outcome of one call, before any classification.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

#[async_trait]
pub trait Endpoint: Send + Sync {
    /// One POST to the model. `Err` means nothing came back (timeout, refused, reset).
    async fn post(&self, request: &GenerateContentRequest) -> Result<HttpReply>;
}

#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Gemini `generateContent` over reqwest. The key travels as the `key` query
/// parameter, never in the body.
pub struct HttpEndpoint {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpEndpoint {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let url = format!(
            "{}/models/{}:generateContent",
            config.api_base.trim_end_matches('/'),
            config.model_name
        );

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Endpoint for HttpEndpoint {
    async fn post(&self, request: &GenerateContentRequest) -> Result<HttpReply> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(reqwest::Error::without_url)?;

        Ok(HttpReply {
            status,
            retry_after,
            body,
        })
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Pause before the attempt with 0-based index `attempt`: 2^attempt seconds, capped.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

fn parse_retry_after(header: Option<&str>) -> u64 {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Sends prompts to the model, retrying the whole call on any transient failure.
pub struct GeminiClient {
    endpoint: Arc<dyn Endpoint>,
    pause: Arc<dyn Pause>,
    max_retries: u32,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let endpoint = HttpEndpoint::new(config)?;
        Ok(Self::with_parts(
            Arc::new(endpoint),
            Arc::new(TokioPause),
            config.max_retries,
        ))
    }

    pub fn with_parts(endpoint: Arc<dyn Endpoint>, pause: Arc<dyn Pause>, max_retries: u32) -> Self {
        Self {
            endpoint,
            pause,
            max_retries,
        }
    }

    /// Returns the model's reply text untouched, or the last failure once
    /// `max_retries` attempts are spent.
    pub async fn send(
        &self,
        prompt: &str,
        generation_config: &GenerationConfig,
    ) -> Result<String, AnalysisError> {
        let request = GenerateContentRequest::new(prompt, generation_config.clone());
        let budget = self.max_retries.max(1);

        let mut attempt: u32 = 0;
        let mut waited_for_rate_limit = false;

        loop {
            if attempt > 0 && !waited_for_rate_limit {
                let delay = backoff_delay(attempt);
                info!(
                    "Retrying API request in {}s (attempt {}/{})",
                    delay.as_secs(),
                    attempt + 1,
                    budget
                );
                self.pause.pause(delay).await;
            }
            attempt += 1;

            let failure = match self.attempt(&request).await {
                Ok(text) => return Ok(text),
                Err(failure) => failure,
            };

            if !failure.is_transient() || attempt >= budget {
                error!("API request failed on attempt {}/{}: {}", attempt, budget, failure);
                return Err(failure.into_error(attempt));
            }

            waited_for_rate_limit = match failure {
                AttemptFailure::RateLimited { retry_after_secs } => {
                    warn!("Rate limited, waiting {}s", retry_after_secs);
                    self.pause.pause(Duration::from_secs(retry_after_secs)).await;
                    true
                }
                other => {
                    warn!("API error on attempt {}/{}: {}", attempt, budget, other);
                    false
                }
            };
        }
    }

    async fn attempt(&self, request: &GenerateContentRequest) -> Result<String, AttemptFailure> {
        let reply = self
            .endpoint
            .post(request)
            .await
            .map_err(|e| AttemptFailure::Transport(format!("{:#}", e)))?;

        match reply.status {
            200 => {
                debug!("Raw API response: {}", preview(&reply.body));
                envelope::extract_text(&reply.body)
            }
            429 => Err(AttemptFailure::RateLimited {
                retry_after_secs: parse_retry_after(reply.retry_after.as_deref()),
            }),
            status => Err(AttemptFailure::Status {
                status,
                body: preview(&reply.body),
            }),
        }
    }
}



#[cfg(test)]
mod http_tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(api_base: String) -> GeminiConfig {
        GeminiConfig {
            api_key: "test-key".to_string(),
            model_name: "gemini-test".to_string(),
            timeout_secs: 5,
            max_retries: 2,
            api_base,
        }
    }

    #[tokio::test]
    async fn test_http_endpoint_sends_prompt_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(query_param("key", "test-key"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{ "text": "hello" }] }],
                "generationConfig": { "temperature": 0.1, "maxOutputTokens": 1024 }
            })))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "7")
                    .set_body_string("slow down"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = HttpEndpoint::new(&config(server.uri())).unwrap();
        let reply = endpoint
            .post(&GenerateContentRequest::new("hello", GenerationConfig::default()))
            .await
            .unwrap();

        assert_eq!(reply.status, 429);
        assert_eq!(reply.retry_after.as_deref(), Some("7"));
        assert_eq!(reply.body, "slow down");
    }

    #[tokio::test]
    async fn test_client_returns_text_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "```json\n{\"sentiment_score\": 4}\n```" }] },
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(server.uri())).unwrap();
        let text = client
            .send("hello", &GenerationConfig::default())
            .await
            .unwrap();

        assert_eq!(text, "```json\n{\"sentiment_score\": 4}\n```");
    }

    #[tokio::test]
    async fn test_timeout_error_does_not_carry_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut cfg = config(server.uri());
        cfg.api_key = "SUPER-SECRET-KEY".to_string();
        cfg.timeout_secs = 1;
        cfg.max_retries = 1;

        let client = GeminiClient::new(&cfg).unwrap();
        let err = client
            .send("hello", &GenerationConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::TransportFailure { attempts: 1, .. }));
        let shown = err.to_string();
        assert!(!shown.contains("SUPER-SECRET-KEY"), "key leaked: {}", shown);
        assert!(!format!("{:?}", err).contains("SUPER-SECRET-KEY"));
    }
}
