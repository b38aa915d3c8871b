use thiserror::Error;

/// Failures surfaced to the caller of an analysis.
///
/// Transport and envelope problems only show up here once the retry budget is
/// spent, so every retried variant carries the number of attempts made.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("API request failed after {attempts} attempts: {cause}")]
    TransportFailure { attempts: u32, cause: String },

    #[error("API returned status {status} after {attempts} attempts: {body}")]
    UpstreamStatus {
        attempts: u32,
        status: u16,
        body: String,
    },

    #[error("malformed response after {attempts} attempts: {reason}")]
    MalformedResponse { attempts: u32, reason: String },

    #[error("response truncated due to token limit - increase maxOutputTokens")]
    TruncatedResponse,

    #[error("invalid sentiment_score: {0}")]
    InvalidScore(i64),
}

/// Outcome of a single upstream attempt that did not yield usable text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptFailure {
    /// Timeout, refused connection, reset, ...
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 429, with the server's requested wait in seconds.
    #[error("rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// Any status other than 200 and 429.
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// 200 whose envelope is missing candidates, content, parts or text.
    #[error("{0}")]
    Malformed(String),

    /// Generation hit maxOutputTokens before emitting any part.
    #[error("response truncated due to token limit")]
    Truncated,
}

impl AttemptFailure {
    /// Transient failures consume one attempt and are retried; the rest abort the call.
    pub fn is_transient(&self) -> bool {
        !matches!(self, AttemptFailure::Truncated)
    }

    /// Wraps the last failure with the total attempt count once the budget is spent.
    pub fn into_error(self, attempts: u32) -> AnalysisError {
        match self {
            AttemptFailure::Transport(cause) => AnalysisError::TransportFailure { attempts, cause },
            AttemptFailure::RateLimited { .. } => AnalysisError::RateLimitExceeded { attempts },
            AttemptFailure::Status { status, body } => AnalysisError::UpstreamStatus {
                attempts,
                status,
                body,
            },
            AttemptFailure::Malformed(reason) => {
                AnalysisError::MalformedResponse { attempts, reason }
            }
            AttemptFailure::Truncated => AnalysisError::TruncatedResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_truncation_is_fatal() {
        assert!(AttemptFailure::Transport("timed out".into()).is_transient());
        assert!(AttemptFailure::RateLimited { retry_after_secs: 5 }.is_transient());
        assert!(AttemptFailure::Status {
            status: 503,
            body: "unavailable".into()
        }
        .is_transient());
        assert!(AttemptFailure::Malformed("No candidates in response".into()).is_transient());
        assert!(!AttemptFailure::Truncated.is_transient());
    }

    #[test]
    fn test_into_error_keeps_attempts_and_cause() {
        let err = AttemptFailure::Transport("connection refused".into()).into_error(3);
        match err {
            AnalysisError::TransportFailure { attempts, cause } => {
                assert_eq!(attempts, 3);
                assert_eq!(cause, "connection refused");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let failure = AttemptFailure::RateLimited { retry_after_secs: 60 };
        assert_eq!(failure.to_string(), "rate limited (retry after 60s)");
        let err = failure.into_error(2);
        assert_eq!(err.to_string(), "rate limit exceeded after 2 attempts");
    }

    #[test]
    fn test_attempt_failure_messages() {
        let status = AttemptFailure::Status {
            status: 503,
            body: "unavailable".into(),
        };
        assert_eq!(status.to_string(), "API returned status 503: unavailable");
        assert_eq!(
            AttemptFailure::Malformed("No candidates in response".into()).to_string(),
            "No candidates in response"
        );
        assert_eq!(
            AttemptFailure::Transport("operation timed out".into()).to_string(),
            "transport error: operation timed out"
        );
    }
}
