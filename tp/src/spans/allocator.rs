//! Span allocation
//!
//! Turns validated booking entries into spans with trip-unique ids and
//! write-once call specifications. A model-proposed id is kept when it is not
//! taken; otherwise the id is derived from a hash of the entry's identity plus
//! a collision counter, so distinct entries never share an id and identical
//! entries get distinct ones.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::templates::ApiTemplates;
use crate::domain::id::short_hash;
use crate::domain::{ServiceKind, Span, SpanDetails};
use crate::planner::BookingNeed;

/// Counter increments tried before giving up on an id
pub const DEFAULT_MAX_COLLISION_ATTEMPTS: u32 = 64;

#[derive(Debug, Error, PartialEq)]
pub enum SpanAllocationError {
    /// Signals corrupted upstream data; not retried
    #[error("could not allocate a unique id for {kind} span '{key}' after {attempts} attempts")]
    Collision {
        kind: ServiceKind,
        key: String,
        attempts: u32,
    },
}

/// Allocates spans for one trip
#[derive(Debug, Clone)]
pub struct SpanAllocator {
    templates: ApiTemplates,
    max_attempts: u32,
}

impl SpanAllocator {
    pub fn new(templates: ApiTemplates) -> Self {
        Self {
            templates,
            max_attempts: DEFAULT_MAX_COLLISION_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Allocate every entry, in order
    pub fn allocate(&self, needs: &[BookingNeed]) -> Result<Vec<Span>, SpanAllocationError> {
        debug!(count = needs.len(), "SpanAllocator::allocate: called");
        let mut used: HashSet<String> = HashSet::with_capacity(needs.len());
        let mut spans = Vec::with_capacity(needs.len());

        for need in needs {
            let span_id = match need.span_id.as_deref() {
                Some(proposed) if !used.contains(proposed) => proposed.to_string(),
                Some(proposed) => {
                    warn!(%proposed, "Duplicate span id from model, synthesizing a new one");
                    self.synthesize_id(need.kind, &need.details, &used)?
                }
                None => self.synthesize_id(need.kind, &need.details, &used)?,
            };
            used.insert(span_id.clone());

            let api_spec = self.templates.render(need.kind, &need.details);
            spans.push(Span::new(span_id, need.kind, need.details.clone(), api_spec));
        }

        info!(count = spans.len(), "Allocated spans");
        Ok(spans)
    }

    fn synthesize_id(
        &self,
        kind: ServiceKind,
        details: &SpanDetails,
        used: &HashSet<String>,
    ) -> Result<String, SpanAllocationError> {
        let key = details.place_key();
        let date = details.primary_date().map(|d| d.to_string()).unwrap_or_default();

        for counter in 0..self.max_attempts {
            let counter_text = counter.to_string();
            let hash = short_hash(&[kind.as_str(), &key, &date, &counter_text], 12);
            let id = format!("{}-{}", kind, hash);
            if !used.contains(&id) {
                if counter > 0 {
                    debug!(%id, counter, "SpanAllocator::synthesize_id: resolved collision");
                }
                return Ok(id);
            }
        }

        Err(SpanAllocationError::Collision {
            kind,
            key,
            attempts: self.max_attempts,
        })
    }
}
