//! PlanGenerator - LLM-driven trip planning
//!
//! Two stages with a hard boundary between them: `request -> raw text` (one
//! provider call) and `raw text -> PlanOutput | OutputError` (extraction and
//! schema validation). Rejected answers are re-asked with a stricter prompt
//! that quotes the rejection, under the shared retry policy.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::error::{AttemptError, OutputError, PlanGenerationError};
use super::extract::extract_json;
use super::schema::{BookingNeed, PlanOutput, parse_plan};
use crate::domain::{DayPlan, TripPlanRequest};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::{PlanPromptContext, PromptLoader, RetryPromptContext};
use crate::retry::{RetryPolicy, retry};

/// A schema-valid plan skeleton, not yet allocated into spans
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub title: String,
    pub summary: Option<String>,
    pub days: Vec<DayPlan>,
    pub booking_needed: Vec<BookingNeed>,
    /// Other options the model proposed
    pub alternatives: usize,
    /// Provider calls it took
    pub attempts: u32,
}

/// Generates plan skeletons from trip requests
pub struct PlanGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
    policy: RetryPolicy,
    max_tokens: u32,
}

impl PlanGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader, policy: RetryPolicy, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            policy,
            max_tokens,
        }
    }

    /// Generate a validated plan, or fail once the retry budget is spent
    pub async fn generate(
        &self,
        request: &TripPlanRequest,
        enrichment: Option<String>,
    ) -> Result<GeneratedPlan, PlanGenerationError> {
        info!(location = %request.location, provider = self.llm.provider(), "Generating trip plan");
        request.validate()?;

        let system_prompt = self.prompts.system_prompt()?;
        let user_prompt = self
            .prompts
            .plan_prompt(&PlanPromptContext::from_request(request, enrichment))?;

        // (raw answer, rejection) of the latest model answer; kept across
        // provider failures so the next answer is still asked strictly
        let rejected: Mutex<Option<(String, String)>> = Mutex::new(None);
        let attempts = AtomicU32::new(0);

        let outcome = retry(&self.policy, "plan_generation", |attempt| {
            let rejected = &rejected;
            let attempts = &attempts;
            let system_prompt = &system_prompt;
            let user_prompt = &user_prompt;
            async move {
                attempts.store(attempt, Ordering::SeqCst);
                let mut messages = vec![Message::user(user_prompt.clone())];
                let previous = rejected.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone();
                if let Some((raw, error)) = previous {
                    let retry_ctx = RetryPromptContext::new(attempt - 1, self.policy.max_attempts, error);
                    messages.push(Message::assistant(raw));
                    messages.push(Message::user(self.prompts.retry_prompt(&retry_ctx)?));
                }

                let response = self
                    .llm
                    .complete(CompletionRequest {
                        system_prompt: system_prompt.clone(),
                        messages,
                        max_tokens: self.max_tokens,
                        json_mode: true,
                    })
                    .await?;

                let text = response.content.unwrap_or_default();
                match extract_json(&text).and_then(parse_plan) {
                    Ok(output) => Ok::<_, AttemptError>(output),
                    Err(e) => {
                        warn!(attempt, error = %e, "Plan output rejected");
                        *rejected.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((text, e.to_string()));
                        Err(AttemptError::Output(e))
                    }
                }
            }
        })
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match outcome {
            Ok(output) => Self::finish(output, attempts),
            Err(AttemptError::Output(last_error)) => Err(PlanGenerationError::InvalidOutput { attempts, last_error }),
            Err(AttemptError::Provider(e)) => Err(PlanGenerationError::Provider(e)),
            Err(AttemptError::Template(e)) => Err(e.into()),
        }
    }

    fn finish(output: PlanOutput, attempts: u32) -> Result<GeneratedPlan, PlanGenerationError> {
        let (primary, alternatives) = output.into_primary().ok_or(PlanGenerationError::InvalidOutput {
            attempts,
            last_error: OutputError::Schema(vec!["options must contain at least one option".to_string()]),
        })?;
        debug!(title = %primary.title, bookings = primary.booking_needed.len(), alternatives, "PlanGenerator::finish: called");
        info!(title = %primary.title, attempts, "Trip plan generated");
        Ok(GeneratedPlan {
            title: primary.title,
            summary: primary.summary,
            days: primary.days,
            booking_needed: primary.booking_needed,
            alternatives,
            attempts,
        })
    }
}
