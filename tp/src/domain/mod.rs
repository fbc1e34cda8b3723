//! Domain types for trip planning

pub mod dates;
pub mod id;
pub mod plan;
pub mod preferences;
pub mod request;

pub use dates::parse_date;
pub use id::{IdResolver, activity_id, generate_id, normalize_text};
pub use plan::{
    Activity, ApiSpec, DayPlan, FetchStatus, Route, ServiceClass, ServiceKind, Span, SpanDetails, TripPlan, TripStatus,
};
pub use preferences::{Interest, LanguagePreference, Pace, PhysicalConstraint, PreferenceCatalog, TripPurpose};
pub use request::{RequestError, TripPlanRequest};
