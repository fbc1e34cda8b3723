//! Plan generation errors

use thiserror::Error;

use crate::domain::RequestError;
use crate::llm::LlmError;
use crate::prompts::PromptError;
use crate::retry::Retryable;

/// Why a model answer was rejected
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("response contained no JSON object or array")]
    NoJson,

    #[error("response was empty")]
    Empty,

    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("schema violations: {}", .0.join("; "))]
    Schema(Vec<String>),
}

/// Request-aborting plan generation failure
#[derive(Debug, Error)]
pub enum PlanGenerationError {
    #[error("invalid trip request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("model output invalid after {attempts} attempts: {last_error}")]
    InvalidOutput { attempts: u32, last_error: OutputError },

    #[error("planning provider failed: {0}")]
    Provider(#[from] LlmError),

    #[error("prompt template error: {0}")]
    Template(String),
}

impl From<PromptError> for PlanGenerationError {
    fn from(e: PromptError) -> Self {
        PlanGenerationError::Template(e.to_string())
    }
}

/// One failed attempt inside the generator's retry loop
#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Provider(#[from] LlmError),

    #[error(transparent)]
    Template(#[from] PromptError),
}

impl Retryable for AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Output(_) => true,
            AttemptError::Provider(e) => e.is_retryable(),
            AttemptError::Template(_) => false,
        }
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            AttemptError::Provider(e) => e.retry_after(),
            _ => None,
        }
    }
}
