//! Span extraction and allocation

mod allocator;
mod templates;

pub use allocator::{DEFAULT_MAX_COLLISION_ATTEMPTS, SpanAllocationError, SpanAllocator};
pub use templates::ApiTemplates;
