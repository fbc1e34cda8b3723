//! Plan generation: prompt the planning provider and validate its answer

mod error;
mod extract;
mod generator;
mod schema;

pub use error::{OutputError, PlanGenerationError};
pub use extract::extract_json;
pub use generator::{GeneratedPlan, PlanGenerator};
pub use schema::{BookingNeed, PlanOption, PlanOutput, parse_plan};
