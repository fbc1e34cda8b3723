//! LLM client module
//!
//! The planning provider boundary: rendered prompt text in, raw text out.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Supports "anthropic" and "openai" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        "openai" => Ok(Arc::new(OpenAIClient::from_config(config)?)),
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::Unconfigured(format!(
                "Unknown LLM provider: '{}'. Supported: anthropic, openai",
                other
            )))
        }
    }
}

/// Map a non-success HTTP response to an error
///
/// 429 carries the server's retry-after hint (seconds, default 60).
pub(crate) async fn error_from_response(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        debug!(retry_after, "error_from_response: rate limited");
        return LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        };
    }
    let message = response.text().await.unwrap_or_default();
    debug!(%status, "error_from_response: API error");
    LlmError::ApiError { status, message }
}

/// Map a reqwest send failure, keeping timeouts distinguishable
pub(crate) fn error_from_send(err: reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Network(err)
    }
}
