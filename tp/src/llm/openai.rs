//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage};
use crate::config::LlmConfig;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, "OpenAIClient::from_config: called");
        let api_key = config
            .api_key()
            .ok_or_else(|| LlmError::Unconfigured(format!("{} is not set", config.api_key_env)))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    /// Build the request body for the OpenAI API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(request.messages.iter().map(|msg| {
            serde_json::json!({
                "role": msg.role.as_str(),
                "content": msg.content,
            })
        }));

        let max_tokens = request.max_tokens.min(self.max_tokens);

        // GPT-5.x and o-series models use max_completion_tokens instead of max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if request.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        body
    }

    fn parse_response(&self, api_response: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
        debug!("parse_response: called");
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        let usage = api_response.usage.unwrap_or_default();
        Ok(CompletionResponse {
            content: choice.message.content,
            stop_reason: StopReason::from_openai(choice.finish_reason.as_deref()),
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| super::error_from_send(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(super::error_from_response(response).await);
        }

        debug!("complete: success");
        let api_response: OpenAIResponse = response.json().await?;
        self.parse_response(api_response)
    }

    fn provider(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    fn client(model: &str) -> OpenAIClient {
        OpenAIClient {
            model: model.to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            http: Client::new(),
            max_tokens: 4096,
            timeout: Duration::from_secs(60),
        }
    }

    fn request(json_mode: bool) -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You plan trips".to_string(),
            messages: vec![Message::user("Plan Porto")],
            max_tokens: 2000,
            json_mode,
        }
    }

    #[test]
    fn test_system_prompt_is_first_message() {
        let body = client("gpt-4o").build_request_body(&request(false));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Plan Porto");
        assert_eq!(body["max_tokens"], 2000);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_json_mode_and_completion_tokens() {
        let body = client("gpt-5-mini").build_request_body(&request(true));
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_completion_tokens"], 2000);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_response_requires_choice() {
        let parsed: OpenAIResponse = serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(client("gpt-4o").parse_response(parsed).is_err());

        let parsed: OpenAIResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": "{}"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        }))
        .unwrap();
        let response = client("gpt-4o").parse_response(parsed).unwrap();
        assert_eq!(response.content.as_deref(), Some("{}"));
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
    }
}
