//! TripPlanner - trip plan orchestration with live span pricing
//!
//! A language model drafts a day-by-day itinerary plus the bookings it needs.
//! Each booking becomes a span with a synthesized price-lookup call, prices
//! are held in a TTL cache per trip, and a refresh controller re-fetches the
//! stale ones in parallel under a deadline.
//!
//! # Modules
//!
//! - [`planner`] - prompt, call, validate, re-prompt
//! - [`spans`] - booking needs to uniquely identified spans
//! - [`booking`] - price lookups behind a circuit breaker
//! - [`cache`] - per-trip TTL price cache
//! - [`refresh`] - bounded, deadline-aware price refresh
//! - [`enrich`] - destination context when no live source answers
//! - [`service`] - the request boundary wiring all of the above

pub mod booking;
pub mod cache;
pub mod cli;
pub mod config;
pub mod domain;
pub mod enrich;
pub mod llm;
pub mod planner;
pub mod prompts;
pub mod refresh;
pub mod repository;
pub mod retry;
pub mod service;
pub mod spans;

pub use booking::{BookingDispatcher, BookingError, BookingProvider, BreakerConfig, HttpBookingProvider, PriceQuote};
pub use cache::{CacheLookup, PriceCache, PriceCacheEntry};
pub use config::Config;
pub use domain::{ServiceKind, Span, SpanDetails, TripPlan, TripPlanRequest};
pub use enrich::{DestinationCatalog, Enrichment, EnrichmentFetcher};
pub use llm::{LlmClient, LlmError, create_client};
pub use planner::{GeneratedPlan, PlanGenerationError, PlanGenerator};
pub use refresh::{RefreshController, RefreshReport, SpanPrice, SpanRefreshStatus};
pub use repository::{FileTripRepository, MemoryTripRepository, RepositoryError, TripRepository};
pub use retry::{RetryPolicy, Retryable, retry};
pub use service::{PlanView, ServiceError, TripService};
pub use spans::{ApiTemplates, SpanAllocationError, SpanAllocator};
