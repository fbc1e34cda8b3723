//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// System prompt for plan generation
pub const TRIP_PLAN_SYSTEM: &str = include_str!("../../prompts/trip-plan-system.pmt");

/// Plan request prompt
pub const TRIP_PLAN: &str = include_str!("../../prompts/trip-plan.pmt");

/// Stricter re-prompt after a rejected answer
pub const TRIP_PLAN_RETRY: &str = include_str!("../../prompts/trip-plan-retry.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "trip-plan-system" => Some(TRIP_PLAN_SYSTEM),
        "trip-plan" => Some(TRIP_PLAN),
        "trip-plan-retry" => Some(TRIP_PLAN_RETRY),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
