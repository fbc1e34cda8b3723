//! Refresh results returned to callers

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::PriceCacheEntry;
use crate::domain::{ServiceKind, TripPlan};
use crate::enrich::Enrichment;

/// What happened to one span during a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanRefreshStatus {
    /// Cached price within its TTL, no dispatch needed
    Fresh,
    /// Cached price past its TTL returned without a dispatch
    StaleReturned,
    /// New price fetched in this refresh
    Refreshed,
    /// Dispatch failed, last known price (if any) returned
    Failed,
    /// Dispatch did not finish before the deadline
    TimedOut,
    /// No price known and none could be fetched
    Unpriced,
}

impl fmt::Display for SpanRefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fresh => "fresh",
            Self::StaleReturned => "stale",
            Self::Refreshed => "refreshed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Unpriced => "unpriced",
        };
        f.write_str(s)
    }
}

/// Price data for one span, annotated with freshness
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanPrice {
    pub span_id: String,
    pub kind: ServiceKind,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub timed_out: bool,
    pub status: SpanRefreshStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SpanPrice {
    pub(crate) fn new(span_id: &str, kind: ServiceKind, entry: Option<&PriceCacheEntry>, now: DateTime<Utc>) -> Self {
        Self {
            span_id: span_id.to_string(),
            kind,
            price: entry.map(|e| e.price),
            currency: entry.map(|e| e.currency.clone()),
            fetched_at: entry.map(|e| e.fetched_at),
            expires_at: entry.map(|e| e.expires_at),
            stale: entry.map(|e| e.is_stale_at(now)).unwrap_or(true),
            timed_out: false,
            status: SpanRefreshStatus::Unpriced,
            error: None,
        }
    }

    pub(crate) fn with_status(mut self, status: SpanRefreshStatus) -> Self {
        self.status = status;
        self.timed_out = status == SpanRefreshStatus::TimedOut;
        self
    }

    pub(crate) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }
}

/// Aggregate result of one refresh request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub trip_id: String,
    pub live: bool,
    pub spans: Vec<SpanPrice>,
    /// Context gathered when no live price source answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
    pub completed_at: DateTime<Utc>,
}

impl RefreshReport {
    pub fn span(&self, span_id: &str) -> Option<&SpanPrice> {
        self.spans.iter().find(|s| s.span_id == span_id)
    }

    pub fn count(&self, status: SpanRefreshStatus) -> usize {
        self.spans.iter().filter(|s| s.status == status).count()
    }

    /// Every span has a price inside its TTL
    pub fn is_complete(&self) -> bool {
        self.spans.iter().all(|s| s.has_price() && !s.stale)
    }

    /// Carry dispatch outcomes onto the plan's spans
    ///
    /// Only spans that were dispatched change state; fresh and stale-returned
    /// spans keep whatever the plan already records.
    pub fn apply_to(&self, plan: &mut TripPlan) {
        for result in &self.spans {
            let Some(span) = plan.span_mut(&result.span_id) else {
                continue;
            };
            match result.status {
                SpanRefreshStatus::Refreshed => {
                    if let (Some(price), Some(currency), Some(fetched_at), Some(expires_at)) =
                        (result.price, result.currency.as_deref(), result.fetched_at, result.expires_at)
                    {
                        span.begin_dispatch();
                        span.record_price(price, currency, fetched_at, expires_at);
                    }
                }
                SpanRefreshStatus::Failed => {
                    span.begin_dispatch();
                    span.record_failure(result.error.clone().unwrap_or_else(|| "unknown error".to_string()));
                }
                SpanRefreshStatus::Fresh
                | SpanRefreshStatus::StaleReturned
                | SpanRefreshStatus::TimedOut
                | SpanRefreshStatus::Unpriced => {}
            }
        }
    }
}
