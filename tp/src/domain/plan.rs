//! Trip plan, spans and their price fetch state

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use tripstore::{Record, now_ms};

use super::request::TripPlanRequest;

/// Bookable service kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Hotel,
    Flight,
    Train,
    Car,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [ServiceKind::Hotel, ServiceKind::Flight, ServiceKind::Train, ServiceKind::Car];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Hotel => "hotel",
            ServiceKind::Flight => "flight",
            ServiceKind::Train => "train",
            ServiceKind::Car => "car",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hotel" => Ok(ServiceKind::Hotel),
            "flight" => Ok(ServiceKind::Flight),
            "train" => Ok(ServiceKind::Train),
            "car" => Ok(ServiceKind::Car),
            other => Err(format!("unknown service kind '{}'", other)),
        }
    }
}

/// Travel class for transport spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceClass {
    Economy,
    Business,
    First,
    Sleeper,
    Premium,
}

impl ServiceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceClass::Economy => "economy",
            ServiceClass::Business => "business",
            ServiceClass::First => "first",
            ServiceClass::Sleeper => "sleeper",
            ServiceClass::Premium => "premium",
        }
    }
}

impl FromStr for ServiceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "economy" => Ok(ServiceClass::Economy),
            "business" => Ok(ServiceClass::Business),
            "first" => Ok(ServiceClass::First),
            "sleeper" => Ok(ServiceClass::Sleeper),
            "premium" => Ok(ServiceClass::Premium),
            other => Err(format!("unknown service class '{}'", other)),
        }
    }
}

/// Origin and destination of a transport span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub from: String,
    pub to: String,
}

/// Kind-specific span attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkin: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passengers: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ServiceClass>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests: Option<u32>,
}

impl SpanDetails {
    /// Where the span takes the traveller: the stay location or route end
    pub fn destination(&self) -> Option<&str> {
        self.route
            .as_ref()
            .map(|r| r.to.as_str())
            .or(self.location.as_deref())
    }

    /// Location or route text used for identity hashing
    pub fn place_key(&self) -> String {
        match (&self.route, &self.location) {
            (Some(route), _) => format!("{}->{}", route.from, route.to),
            (None, Some(location)) => location.clone(),
            (None, None) => String::new(),
        }
    }

    /// Primary date: checkin for stays, travel date otherwise
    pub fn primary_date(&self) -> Option<NaiveDate> {
        self.date.or(self.checkin)
    }
}

/// A synthesized call description for a span's price source. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// Stored fetch state of a span
///
/// `Stale` is not stored: it is derived at read time from `ttl_expiry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Created,
    PriceFetchPending,
    PriceFetched,
    Refreshing,
    FetchFailed,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchStatus::Created => "created",
            FetchStatus::PriceFetchPending => "price_fetch_pending",
            FetchStatus::PriceFetched => "price_fetched",
            FetchStatus::Refreshing => "refreshing",
            FetchStatus::FetchFailed => "fetch_failed",
        };
        f.write_str(s)
    }
}

/// One bookable segment of a trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    span_id: String,
    kind: ServiceKind,
    details: SpanDetails,
    api_spec: ApiSpec,

    pub price: Option<f64>,
    pub currency: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub ttl_expiry: Option<DateTime<Utc>>,
    pub fetch_status: FetchStatus,

    /// Last dispatch failure, kept for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Span {
    pub fn new(span_id: String, kind: ServiceKind, details: SpanDetails, api_spec: ApiSpec) -> Self {
        Self {
            span_id,
            kind,
            details,
            api_spec,
            price: None,
            currency: None,
            fetched_at: None,
            ttl_expiry: None,
            fetch_status: FetchStatus::Created,
            last_error: None,
        }
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn details(&self) -> &SpanDetails {
        &self.details
    }

    pub fn api_spec(&self) -> &ApiSpec {
        &self.api_spec
    }

    /// Mark a dispatch as started
    pub fn begin_dispatch(&mut self) {
        self.fetch_status = match self.fetch_status {
            FetchStatus::Created => FetchStatus::PriceFetchPending,
            _ => FetchStatus::Refreshing,
        };
        debug!(span_id = %self.span_id, status = %self.fetch_status, "Span::begin_dispatch: called");
    }

    /// Record a successful price lookup
    pub fn record_price(&mut self, price: f64, currency: &str, fetched_at: DateTime<Utc>, ttl_expiry: DateTime<Utc>) {
        self.price = Some(price);
        self.currency = Some(currency.to_string());
        self.fetched_at = Some(fetched_at);
        self.ttl_expiry = Some(ttl_expiry);
        self.fetch_status = FetchStatus::PriceFetched;
        self.last_error = None;
    }

    /// Record a failed lookup; the last known price stays in place
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.fetch_status = FetchStatus::FetchFailed;
        self.last_error = Some(error.into());
    }

    /// Whether the held price is past its expiry at `now`
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.ttl_expiry.map(|expiry| now >= expiry).unwrap_or(true)
    }
}

/// An activity suggested for a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub activity_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub category: String,
}

/// Activities grouped by day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub activities: Vec<Activity>,
}

/// Lifecycle of a stored plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    /// Generated, initial pricing not yet run
    Draft,
    /// Initial pricing ran
    Active,
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripStatus::Draft => f.write_str("draft"),
            TripStatus::Active => f.write_str("active"),
        }
    }
}

/// A generated trip plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    pub trip_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub days: Vec<DayPlan>,
    pub spans: Vec<Span>,
    /// Copy of the request this plan answers
    pub metadata: TripPlanRequest,
    pub status: TripStatus,
    /// Bumped on every persisted change
    pub version: u64,
    /// Number of other options the model proposed
    #[serde(default)]
    pub alternatives: usize,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TripPlan {
    pub fn new(
        trip_id: String,
        title: String,
        summary: Option<String>,
        days: Vec<DayPlan>,
        spans: Vec<Span>,
        metadata: TripPlanRequest,
    ) -> Self {
        let now = now_ms();
        Self {
            trip_id,
            title,
            summary,
            days,
            spans,
            metadata,
            status: TripStatus::Draft,
            version: 0,
            alternatives: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn span(&self, span_id: &str) -> Option<&Span> {
        self.spans.iter().find(|s| s.span_id() == span_id)
    }

    pub fn span_mut(&mut self, span_id: &str) -> Option<&mut Span> {
        self.spans.iter_mut().find(|s| s.span_id() == span_id)
    }

    /// Record a change: bump version and timestamp
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = now_ms();
    }

    /// Sum of known span prices per currency
    pub fn totals(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for span in &self.spans {
            if let (Some(price), Some(currency)) = (span.price, span.currency.as_ref()) {
                *totals.entry(currency.clone()).or_insert(0.0) += price;
            }
        }
        totals
    }
}

impl Record for TripPlan {
    fn id(&self) -> &str {
        &self.trip_id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "trips"
    }
}
