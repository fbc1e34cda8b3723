//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for trip planning.
//!
//! Template loading chain:
//! 1. `{prompts-dir}/{name}.pmt` (configured override directory)
//! 2. Embedded fallback compiled into the binary
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{LabeledValue, PlanPromptContext, PromptError, PromptLoader, RetryPromptContext};
