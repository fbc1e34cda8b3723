//! LLM error types

use std::time::Duration;
use thiserror::Error;

use crate::retry::Retryable;

/// Failures from one planning provider call
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    Unconfigured(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::ApiError { status, .. } => *status >= 500 || *status == 408,
            LlmError::RateLimited { .. } | LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_) | LlmError::Unconfigured(_) | LlmError::Json(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> LlmError {
        LlmError::ApiError {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_retryable_classification() {
        let cases = [
            (api(500), true),
            (api(503), true),
            (api(408), true),
            (api(400), false),
            (api(401), false),
            (LlmError::Timeout(Duration::from_secs(30)), true),
            (LlmError::InvalidResponse("no content".to_string()), false),
            (LlmError::Unconfigured("OPENAI_API_KEY".to_string()), false),
        ];
        for (err, expected) in cases {
            assert_eq!(err.is_retryable(), expected, "{}", err);
        }
    }

    #[test]
    fn test_rate_limit_carries_wait() {
        let err = LlmError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(api(502).retry_after(), None);
    }
}
