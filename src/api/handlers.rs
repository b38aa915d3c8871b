use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use log::{error, info};
use serde::Serialize;
use serde_json::Value;

use super::ApiState;
use crate::analyzer::sentiment::TimedSentiment;
use crate::analyzer::{AnalysisRequest, MAX_TEXT_CHARS};
use crate::config::ConfigSummary;
use crate::error::AnalysisError;

pub const MAX_BATCH_SIZE: usize = 50;

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Custom error type that implements IntoResponse
pub enum ApiError {
    InvalidInput(String),
    AnalysisFailed(AnalysisError),
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::AnalysisFailed(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sentiment analysis failed".to_string(),
                Some(e.to_string()),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Endpoint not found".to_string(), None),
        };

        let body = Json(ErrorResponse { error, details });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub config: ConfigSummary,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub sentiment: TimedSentiment,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct BatchSuccess {
    pub id: String,
    #[serde(flatten)]
    pub sentiment: TimedSentiment,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Success(BatchSuccess),
    Failure(BatchFailure),
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_processing_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
    pub summary: BatchSummary,
    pub timestamp: String,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

fn round_millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 10_000.0).round() / 10.0
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match body {
        Ok(Json(Value::Null)) => Err(ApiError::InvalidInput("Request body is required".into())),
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Err(ApiError::InvalidInput(
            "Content-Type must be application/json".into(),
        )),
        Err(e) => Err(ApiError::InvalidInput(format!("Invalid JSON body: {}", e))),
    }
}

/// Checks the `text` field of an item and returns it trimmed.
fn validated_text(item: &Value) -> Result<String, String> {
    let text = match item.get("text") {
        None => return Err("text field is required".into()),
        Some(Value::String(text)) => text.trim(),
        Some(_) => return Err("text must be a string".into()),
    };

    if text.is_empty() {
        return Err("text cannot be empty".into());
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err("text cannot exceed 10,000 characters".into());
    }
    Ok(text.to_string())
}

fn build_request(text: String, item: &Value) -> AnalysisRequest {
    let mut request = AnalysisRequest::new(text);
    if let Some(language) = item.get("language").and_then(Value::as_str) {
        request.language = language.to_string();
    }
    request.context = item
        .get("context")
        .and_then(Value::as_str)
        .map(str::to_string);
    request
}

fn item_id(item: &Value, index: usize) -> String {
    match item.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => index.to_string(),
    }
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: timestamp(),
        version: env!("CARGO_PKG_VERSION"),
        config: state.config.as_ref().clone(),
    })
}

/// POST /api/analyze
/// Classifies one text
pub async fn analyze_sentiment(
    State(state): State<ApiState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    info!("Processing sentiment analysis request");

    let body = json_body(body)?;
    let text = validated_text(&body).map_err(ApiError::InvalidInput)?;
    let request = build_request(text, &body);

    let sentiment = state
        .analyzer
        .analyze(&request)
        .await
        .map_err(ApiError::AnalysisFailed)?;

    Ok(Json(AnalyzeResponse {
        sentiment,
        timestamp: timestamp(),
    }))
}

/// POST /api/batch
/// Classifies up to 50 texts one after another. A failing item is reported in
/// place and does not stop the rest.
pub async fn batch_analyze(
    State(state): State<ApiState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    info!("Processing batch sentiment analysis request");

    let body = json_body(body)?;
    let texts = match body.get("texts") {
        None => return Err(ApiError::InvalidInput("texts field is required".into())),
        Some(Value::Array(texts)) => texts,
        Some(_) => return Err(ApiError::InvalidInput("texts must be an array".into())),
    };
    if texts.is_empty() {
        return Err(ApiError::InvalidInput("texts array cannot be empty".into()));
    }
    if texts.len() > MAX_BATCH_SIZE {
        return Err(ApiError::InvalidInput(format!(
            "Cannot process more than {} texts at once",
            MAX_BATCH_SIZE
        )));
    }

    let started = Instant::now();
    let mut results = Vec::with_capacity(texts.len());

    for (index, raw_item) in texts.iter().enumerate() {
        let item = match raw_item {
            Value::String(text) => serde_json::json!({ "text": text }),
            Value::Object(_) => raw_item.clone(),
            _ => {
                results.push(BatchItem::Failure(BatchFailure {
                    id: index.to_string(),
                    error: "Invalid text item format".into(),
                }));
                continue;
            }
        };
        let id = item_id(&item, index);

        let text = match validated_text(&item) {
            Ok(text) => text,
            Err(error) => {
                results.push(BatchItem::Failure(BatchFailure { id, error }));
                continue;
            }
        };

        match state.analyzer.analyze(&build_request(text, &item)).await {
            Ok(sentiment) => results.push(BatchItem::Success(BatchSuccess { id, sentiment })),
            Err(e) => {
                error!("Batch item {} failed: {}", id, e);
                results.push(BatchItem::Failure(BatchFailure {
                    id,
                    error: format!("Analysis failed: {}", e),
                }));
            }
        }
    }

    let successful = results
        .iter()
        .filter(|r| matches!(r, BatchItem::Success(_)))
        .count();
    let failed = results.len() - successful;

    info!(
        "Batch analysis completed: {} successful, {} failed",
        successful, failed
    );

    Ok(Json(BatchResponse {
        summary: BatchSummary {
            total: texts.len(),
            successful,
            failed,
            total_processing_time_ms: round_millis(started.elapsed()),
        },
        results,
        timestamp: timestamp(),
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
