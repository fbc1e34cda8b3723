//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to
//! embedded defaults, then renders them with Handlebars.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::embedded;
use crate::domain::{ServiceKind, TripPlanRequest};

/// Largest number of alternative options requested from the model
const MAX_OPTIONS: usize = 3;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template not found: {0}")]
    NotFound(String),

    #[error("Failed to read prompt {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render template {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: handlebars::RenderError,
    },
}

/// A preference value with its description
#[derive(Debug, Clone, Serialize)]
pub struct LabeledValue {
    pub label: String,
    pub details: String,
}

impl LabeledValue {
    fn new(label: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            details: details.into(),
        }
    }
}

/// Variables substituted into the plan prompt
#[derive(Debug, Clone, Serialize)]
pub struct PlanPromptContext {
    pub location: String,
    pub from_location: Option<String>,
    pub style: String,
    pub budget: String,
    pub start_date: String,
    pub end_date: String,
    pub nights: i64,
    pub days: Vec<String>,
    pub trip_scope: String,
    pub trip_purpose: Option<LabeledValue>,
    pub pace: Option<LabeledValue>,
    pub language_preference: Option<LabeledValue>,
    pub physical_constraints: Vec<LabeledValue>,
    pub interests: Vec<LabeledValue>,
    pub additional_notes: Option<String>,
    pub enrichment: Option<String>,
    pub service_kinds: String,
    pub service_classes: String,
    pub max_options: usize,
}

impl PlanPromptContext {
    /// Build the prompt variables from a validated request
    pub fn from_request(request: &TripPlanRequest, enrichment: Option<String>) -> Self {
        debug!(location = %request.location, has_enrichment = enrichment.is_some(), "PlanPromptContext::from_request: called");
        Self {
            location: request.location.clone(),
            from_location: request.from_location.clone(),
            style: request.style.clone(),
            budget: format!("{:.2}", request.budget),
            start_date: request.start_date.to_string(),
            end_date: request.end_date.to_string(),
            nights: request.nights(),
            days: request.daily_dates().iter().map(|d| d.to_string()).collect(),
            trip_scope: request.trip_scope_description(),
            trip_purpose: request.trip_purpose.map(|p| LabeledValue::new(p.label(), p.details())),
            pace: request.pace.map(|p| LabeledValue::new(p.label(), p.details())),
            language_preference: request
                .language_preference
                .map(|p| LabeledValue::new(p.label(), p.details())),
            physical_constraints: request
                .physical_constraints
                .iter()
                .map(|p| LabeledValue::new(p.label(), p.details()))
                .collect(),
            interests: request
                .interests
                .iter()
                .map(|p| LabeledValue::new(p.label(), p.details()))
                .collect(),
            additional_notes: request.additional_notes.clone(),
            enrichment,
            service_kinds: service_kinds(),
            service_classes: "economy, business, first, sleeper, premium".to_string(),
            max_options: MAX_OPTIONS,
        }
    }
}

/// Variables for the stricter re-prompt
#[derive(Debug, Clone, Serialize)]
pub struct RetryPromptContext {
    pub attempt: u32,
    pub max_attempts: u32,
    pub previous_error: String,
    pub service_kinds: String,
}

impl RetryPromptContext {
    pub fn new(attempt: u32, max_attempts: u32, previous_error: impl Into<String>) -> Self {
        Self {
            attempt,
            max_attempts,
            previous_error: previous_error.into(),
            service_kinds: service_kinds(),
        }
    }
}

fn service_kinds() -> String {
    ServiceKind::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// Override directory (e.g., `~/.config/tripplanner/prompts/`)
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `dir` before the embedded prompts
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let exists = dir.is_dir();
        debug!(?dir, %exists, "PromptLoader::new: called");
        Self {
            hbs: prompt_engine(),
            override_dir: if exists { Some(dir.to_path_buf()) } else { None },
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: prompt_engine(),
            override_dir: None,
        }
    }

    /// Load a template by name
    fn load_template(&self, name: &str) -> Result<String, PromptError> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found override");
                return std::fs::read_to_string(&path).map_err(|source| PromptError::Read { path, source });
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| PromptError::NotFound(name.to_string()))
    }

    /// Render a template with the given context
    pub fn render<C: Serialize>(&self, template_name: &str, context: &C) -> Result<String, PromptError> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|source| PromptError::Render {
                name: template_name.to_string(),
                source,
            })
    }

    /// Render the system prompt
    pub fn system_prompt(&self) -> Result<String, PromptError> {
        self.load_template("trip-plan-system")
    }

    /// Render the plan request prompt
    pub fn plan_prompt(&self, context: &PlanPromptContext) -> Result<String, PromptError> {
        info!("Rendering plan prompt for {}", context.location);
        self.render("trip-plan", context)
    }

    /// Render the stricter re-prompt
    pub fn retry_prompt(&self, context: &RetryPromptContext) -> Result<String, PromptError> {
        debug!(attempt = context.attempt, "PromptLoader::retry_prompt: called");
        self.render("trip-plan-retry", context)
    }
}

/// Prompts are plain text, so HTML escaping is off
fn prompt_engine() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Interest, Pace};
    use chrono::NaiveDate;

    fn request() -> TripPlanRequest {
        let mut req = TripPlanRequest::new(
            "Lisbon & Sintra",
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            1500.0,
        );
        req.interests = vec![Interest::Photography];
        req.pace = Some(Pace::Relaxed);
        req
    }

    #[test]
    fn test_plan_prompt_substitutes_preferences() {
        let loader = PromptLoader::embedded_only();
        let ctx = PlanPromptContext::from_request(&request(), None);
        let prompt = loader.plan_prompt(&ctx).unwrap();

        // no HTML escaping of '&'
        assert!(prompt.contains("Destination: Lisbon & Sintra"));
        assert!(prompt.contains("- 2025-05-01"));
        assert!(prompt.contains("- 2025-05-03"));
        assert!(prompt.contains("PHOTOGRAPHY: Photography opportunities"));
        assert!(prompt.contains("Pace: RELAXED (Leisurely pace"));
        assert!(prompt.contains("hotel, flight, train, car"));
        assert!(!prompt.contains("Background on the destination"));
        assert!(!prompt.contains("Physical constraints"));
    }

    #[test]
    fn test_plan_prompt_includes_enrichment() {
        let loader = PromptLoader::embedded_only();
        let ctx = PlanPromptContext::from_request(&request(), Some("Trams climb the hills.".to_string()));
        let prompt = loader.plan_prompt(&ctx).unwrap();
        assert!(prompt.contains("Trams climb the hills."));
    }

    #[test]
    fn test_retry_prompt_quotes_error() {
        let loader = PromptLoader::embedded_only();
        let ctx = RetryPromptContext::new(1, 3, "options[0].days is empty");
        let prompt = loader.retry_prompt(&ctx).unwrap();
        assert!(prompt.contains("options[0].days is empty"));
        assert!(prompt.contains("attempt 1 of 3"));
    }

    #[test]
    fn test_override_directory_wins() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("trip-plan-system.pmt"), "custom system").unwrap();

        let loader = PromptLoader::new(temp.path());
        assert_eq!(loader.system_prompt().unwrap(), "custom system");
        // others still fall back to embedded
        assert!(loader.render("trip-plan-retry", &RetryPromptContext::new(2, 3, "x")).is_ok());
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(matches!(loader.load_template("nonexistent"), Err(PromptError::NotFound(_))));
    }
}
