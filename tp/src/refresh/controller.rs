//! RefreshController - fan-out/fan-in of span price refreshes
//!
//! Reads every span's cache entry, dispatches the stale or missing ones in
//! parallel (bounded by a semaphore), and collects whatever finished before
//! the deadline. Unfinished dispatches are aborted; the dispatcher writes the
//! cache only after its last await, so an aborted dispatch writes nothing.
//! The same deadline bounds the enrichment fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::report::{RefreshReport, SpanPrice, SpanRefreshStatus};
use crate::booking::{BookingDispatcher, BookingError};
use crate::cache::PriceCacheEntry;
use crate::config::RefreshConfig;
use crate::domain::{Span, TripPlan};
use crate::enrich::{Enrichment, EnrichmentFetcher};

pub struct RefreshController {
    dispatcher: Arc<BookingDispatcher>,
    enrichment: Option<Arc<EnrichmentFetcher>>,
    max_parallelism: usize,
    deadline: Duration,
}

impl RefreshController {
    pub fn new(dispatcher: Arc<BookingDispatcher>, config: &RefreshConfig) -> Self {
        debug!(
            max_parallelism = config.max_parallelism,
            deadline_ms = config.deadline_ms,
            "RefreshController::new: called"
        );
        Self {
            dispatcher,
            enrichment: None,
            max_parallelism: config.max_parallelism.max(1),
            deadline: Duration::from_millis(config.deadline_ms),
        }
    }

    /// Gather destination context when live pricing is unavailable
    pub fn with_enrichment(mut self, fetcher: Arc<EnrichmentFetcher>) -> Self {
        self.enrichment = Some(fetcher);
        self
    }

    pub fn dispatcher(&self) -> &Arc<BookingDispatcher> {
        &self.dispatcher
    }

    /// Refresh a trip's span prices
    ///
    /// With `live == false` the cache is reported as-is. Otherwise spans whose
    /// entry is missing, past its TTL, or older than `max_age` are dispatched.
    pub async fn refresh(&self, plan: &TripPlan, live: bool, max_age: Option<Duration>) -> RefreshReport {
        self.refresh_with_context(plan, live, max_age, None).await
    }

    /// Like [`refresh`](Self::refresh), reusing enrichment the caller already fetched
    pub async fn refresh_with_context(
        &self,
        plan: &TripPlan,
        live: bool,
        max_age: Option<Duration>,
        known: Option<Enrichment>,
    ) -> RefreshReport {
        let trip_id = plan.trip_id.as_str();
        debug!(%trip_id, live, ?max_age, spans = plan.spans.len(), "RefreshController::refresh: called");
        let deadline = tokio::time::Instant::now() + self.deadline;

        let cache = self.dispatcher.cache();
        let now = Utc::now();
        let mut results: Vec<SpanPrice> = Vec::with_capacity(plan.spans.len());
        let mut pending: Vec<(usize, Span)> = Vec::new();

        for span in &plan.spans {
            let entry = cache.get_at(trip_id, span.span_id(), now).map(|l| l.entry);
            let needs_refresh = match &entry {
                None => true,
                Some(e) => e.is_stale_at(now) || exceeds_max_age(e, now, max_age),
            };

            let price = SpanPrice::new(span.span_id(), span.kind(), entry.as_ref(), now);
            let status = match (&entry, needs_refresh) {
                (None, _) => SpanRefreshStatus::Unpriced,
                (Some(_), false) => SpanRefreshStatus::Fresh,
                (Some(_), true) => SpanRefreshStatus::StaleReturned,
            };
            results.push(price.with_status(status));

            if live && needs_refresh {
                pending.push((results.len() - 1, span.clone()));
            }
        }

        let mut circuit_open = false;
        if !pending.is_empty() {
            if self.dispatcher.is_configured() {
                circuit_open = self.dispatch_all(trip_id, pending, &mut results, deadline).await;
            } else {
                debug!(%trip_id, "RefreshController::refresh: no booking source configured");
            }
        }

        let enrichment = if live && (!self.dispatcher.is_configured() || circuit_open) {
            self.enrich(&plan.metadata.location, known, deadline).await
        } else {
            None
        };

        let report = RefreshReport {
            trip_id: trip_id.to_string(),
            live,
            spans: results,
            enrichment,
            completed_at: Utc::now(),
        };
        info!(
            %trip_id,
            live,
            refreshed = report.count(SpanRefreshStatus::Refreshed),
            failed = report.count(SpanRefreshStatus::Failed),
            timed_out = report.count(SpanRefreshStatus::TimedOut),
            "Refresh complete"
        );
        report
    }

    /// Destination context, cut off at the refresh deadline
    async fn enrich(
        &self,
        location: &str,
        known: Option<Enrichment>,
        deadline: tokio::time::Instant,
    ) -> Option<Enrichment> {
        if known.is_some() {
            return known;
        }
        let fetcher = self.enrichment.as_ref()?;
        match tokio::time::timeout_at(deadline, fetcher.fetch(location)).await {
            Ok(enrichment) => Some(enrichment),
            Err(_) => {
                warn!(%location, "Refresh deadline reached during enrichment");
                Some(Enrichment::Empty)
            }
        }
    }

    /// Dispatch `pending` spans, writing outcomes into `results`
    ///
    /// Returns whether any dispatch was short-circuited by an open breaker.
    async fn dispatch_all(
        &self,
        trip_id: &str,
        pending: Vec<(usize, Span)>,
        results: &mut [SpanPrice],
        deadline: tokio::time::Instant,
    ) -> bool {
        debug!(%trip_id, count = pending.len(), "RefreshController::dispatch_all: called");
        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));
        let mut tasks = JoinSet::new();
        let mut outstanding: HashMap<String, usize> = HashMap::new();
        let mut task_spans: HashMap<tokio::task::Id, String> = HashMap::new();

        for (index, span) in pending {
            let span_id = span.span_id().to_string();
            outstanding.insert(span_id.clone(), index);
            let dispatcher = self.dispatcher.clone();
            let semaphore = semaphore.clone();
            let trip_id = trip_id.to_string();
            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = dispatcher.dispatch(&trip_id, &span).await;
                (span.span_id().to_string(), result)
            });
            task_spans.insert(handle.id(), span_id);
        }

        let mut circuit_open = false;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((span_id, result)))) => {
                    let Some(index) = outstanding.remove(&span_id) else {
                        continue;
                    };
                    if matches!(result, Err(BookingError::CircuitOpen { .. })) {
                        circuit_open = true;
                    }
                    results[index] = outcome(&results[index], result);
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "Dispatch task failed");
                    let index = task_spans.get(&e.id()).and_then(|span_id| outstanding.remove(span_id));
                    if let Some(index) = index {
                        results[index] = failed(&results[index], format!("dispatch task failed: {e}"));
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(%trip_id, remaining = outstanding.len(), "Refresh deadline reached, aborting dispatches");
                    tasks.abort_all();
                    break;
                }
            }
        }

        // Aborted at the deadline; report whatever the cache holds now
        let cache = self.dispatcher.cache();
        let now = Utc::now();
        for (span_id, index) in outstanding {
            let entry = cache.get_at(trip_id, &span_id, now).map(|l| l.entry);
            let kind = results[index].kind;
            results[index] =
                SpanPrice::new(&span_id, kind, entry.as_ref(), now).with_status(SpanRefreshStatus::TimedOut);
        }
        circuit_open
    }
}

fn exceeds_max_age(entry: &PriceCacheEntry, now: chrono::DateTime<Utc>, max_age: Option<Duration>) -> bool {
    match max_age.and_then(|d| chrono::Duration::from_std(d).ok()) {
        Some(max_age) => entry.age_at(now) >= max_age,
        None => false,
    }
}

/// Turn a dispatch result into the span's reported price
fn outcome(previous: &SpanPrice, result: Result<PriceCacheEntry, BookingError>) -> SpanPrice {
    let now = Utc::now();
    match result {
        Ok(entry) => SpanPrice::new(&previous.span_id, previous.kind, Some(&entry), now)
            .with_status(SpanRefreshStatus::Refreshed),
        Err(BookingError::Unconfigured) => previous.clone(),
        Err(e) => failed(previous, e.to_string()),
    }
}

/// Previous price kept, marked stale, with the failure attached
fn failed(previous: &SpanPrice, error: String) -> SpanPrice {
    let mut failed = previous.clone().with_status(SpanRefreshStatus::Failed).with_error(error);
    failed.stale = true;
    failed
}
