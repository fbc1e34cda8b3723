//! Content sources for enrichment

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::retry::Retryable;

/// Largest body accepted from a source
const MAX_BODY_BYTES: usize = 1_000_000;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response too large ({0} bytes)")]
    TooLarge(usize),

    #[error("Unsupported URL: {0}")]
    InvalidUrl(String),
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status(status) => *status == 429 || *status >= 500,
            Self::Network(_) | Self::Timeout(_) => true,
            Self::TooLarge(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Something that returns readable text for a URL
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetches pages over HTTP and converts HTML to markdown
pub struct HttpContentSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpContentSource {
    pub fn new(timeout: Duration) -> Self {
        debug!(?timeout, "HttpContentSource::new: called");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tripplanner/", env!("CARGO_PKG_VERSION"), " (enrichment)"))
            .build()
            .unwrap_or_default();
        Self { client, timeout }
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!(%url, "HttpContentSource::fetch: called");
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "HttpContentSource::fetch: error status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response.text().await.map_err(|e| FetchError::Network(e.to_string()))?;
        if body.len() > MAX_BODY_BYTES {
            return Err(FetchError::TooLarge(body.len()));
        }

        Ok(to_readable(&content_type, body))
    }
}

/// HTML becomes markdown, JSON is pretty-printed, anything else passes through
pub(crate) fn to_readable(content_type: &str, body: String) -> String {
    if content_type.contains("text/html") || content_type.contains("application/xhtml") {
        html2md::rewrite_html(&body, false)
    } else if content_type.contains("application/json") {
        match serde_json::from_str::<Value>(&body) {
            Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(body),
            Err(_) => body,
        }
    } else {
        body
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_retryable() {
        assert!(FetchError::Status(503).is_retryable());
        assert!(FetchError::Status(429).is_retryable());
        assert!(!FetchError::Status(404).is_retryable());
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!FetchError::TooLarge(10).is_retryable());
    }

    #[test]
    fn test_to_readable_json_pretty() {
        let out = to_readable("application/json", r#"{"a":1}"#.to_string());
        assert!(out.contains("\"a\": 1"));
    }

    #[test]
    fn test_to_readable_html() {
        let out = to_readable("text/html; charset=utf-8", "<h1>Tokyo</h1><p>Big city</p>".to_string());
        assert!(out.contains("Tokyo"));
        assert!(!out.contains("<h1>"));
    }

    #[tokio::test]
    async fn test_http_rejects_non_http_url() {
        let source = HttpContentSource::new(Duration::from_secs(1));
        let err = source.fetch("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
