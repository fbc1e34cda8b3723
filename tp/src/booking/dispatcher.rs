//! BookingDispatcher - one price lookup per span
//!
//! Short-circuits through the breaker, retries transient failures with the
//! shared retry policy, and on success replaces the span's cache entry in one
//! write. A dispatch dropped mid-flight never reaches that write, so a
//! cancelled lookup leaves the previous entry untouched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::breaker::{BreakerConfig, CircuitBreaker};
use super::error::BookingError;
use super::provider::BookingProvider;
use crate::cache::{PriceCache, PriceCacheEntry};
use crate::domain::Span;
use crate::retry::{RetryPolicy, retry};

pub struct BookingDispatcher {
    provider: Option<Arc<dyn BookingProvider>>,
    cache: Arc<PriceCache>,
    breaker: CircuitBreaker,
    policy: RetryPolicy,
    ttl: Duration,
}

impl BookingDispatcher {
    pub fn new(
        provider: Option<Arc<dyn BookingProvider>>,
        cache: Arc<PriceCache>,
        breaker: BreakerConfig,
        policy: RetryPolicy,
    ) -> Self {
        let ttl = cache.default_ttl();
        Self {
            provider,
            cache,
            breaker: CircuitBreaker::new(breaker),
            policy,
            ttl,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    /// Look up the span's price and store it under (trip, span)
    pub async fn dispatch(&self, trip_id: &str, span: &Span) -> Result<PriceCacheEntry, BookingError> {
        let span_id = span.span_id();
        let kind = span.kind();
        let destination = span.details().destination().unwrap_or("").to_string();
        debug!(%trip_id, %span_id, %kind, %destination, "BookingDispatcher::dispatch: called");

        let Some(provider) = self.provider.as_ref() else {
            return Err(BookingError::Unconfigured);
        };

        if let Err(retry_in) = self.breaker.check_at(&destination, kind, std::time::Instant::now()) {
            debug!(%span_id, "BookingDispatcher::dispatch: short-circuited by breaker");
            return Err(BookingError::CircuitOpen {
                destination,
                kind,
                retry_in,
            });
        }

        let spec = span.api_spec();
        let label = format!("dispatch:{}", span_id);
        let result = retry(&self.policy, &label, |_| provider.execute(spec)).await;

        match result {
            Ok(quote) => {
                self.breaker.record_success(&destination, kind);
                let entry = self
                    .cache
                    .set(trip_id, span_id, quote.price, &quote.currency, Utc::now(), self.ttl);
                info!(%trip_id, %span_id, price = quote.price, currency = %quote.currency, "Price fetched");
                Ok(entry)
            }
            Err(e) => {
                self.breaker.record_failure(&destination, kind);
                warn!(%trip_id, %span_id, error = %e, "Price fetch failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::provider::PriceQuote;
    use crate::booking::provider::mock::MockBookingProvider;
    use crate::domain::{ServiceKind, SpanDetails};
    use crate::spans::ApiTemplates;

    fn span(id: &str, location: &str) -> Span {
        let details = SpanDetails {
            location: Some(location.to_string()),
            ..SpanDetails::default()
        };
        let spec = ApiTemplates::new().render(ServiceKind::Hotel, &details);
        Span::new(id.to_string(), ServiceKind::Hotel, details, spec)
    }

    fn breaker(threshold: u32) -> BreakerConfig {
        BreakerConfig {
            threshold,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(300),
        }
    }

    fn dispatcher(provider: Arc<MockBookingProvider>, attempts: u32, threshold: u32) -> BookingDispatcher {
        BookingDispatcher::new(
            Some(provider),
            Arc::new(PriceCache::default()),
            breaker(threshold),
            RetryPolicy::immediate(attempts),
        )
    }

    fn quote(price: f64) -> Result<PriceQuote, BookingError> {
        Ok(PriceQuote {
            price,
            currency: "EUR".to_string(),
        })
    }

    #[tokio::test]
    async fn test_success_writes_cache() {
        let provider = Arc::new(MockBookingProvider::fixed(150.0));
        let d = dispatcher(provider.clone(), 3, 5);

        let entry = d.dispatch("trip", &span("h1", "Oslo")).await.unwrap();
        assert_eq!(entry.price, 150.0);
        assert_eq!(d.cache().get("trip", "h1").unwrap().entry, entry);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let provider = Arc::new(
            MockBookingProvider::fixed(0.0).script(
                "Oslo",
                vec![Err(BookingError::from_status(503, "busy")), Err(BookingError::from_status(502, "")), quote(99.0)],
            ),
        );
        let d = dispatcher(provider.clone(), 3, 5);

        let entry = d.dispatch("trip", &span("h1", "Oslo")).await.unwrap();
        assert_eq!(entry.price, 99.0);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let provider = Arc::new(MockBookingProvider::failing(BookingError::from_status(400, "bad checkin")));
        let d = dispatcher(provider.clone(), 3, 5);

        let err = d.dispatch("trip", &span("h1", "Oslo")).await.unwrap_err();
        assert!(matches!(err, BookingError::Permanent { status: Some(400), .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_entry() {
        let provider = Arc::new(MockBookingProvider::fixed(0.0).script(
            "Oslo",
            vec![quote(120.0), Err(BookingError::from_status(500, "down"))],
        ));
        let d = dispatcher(provider, 1, 5);
        let s = span("h1", "Oslo");

        d.dispatch("trip", &s).await.unwrap();
        assert!(d.dispatch("trip", &s).await.is_err());
        assert_eq!(d.cache().get("trip", "h1").unwrap().entry.price, 120.0);
    }

    #[tokio::test]
    async fn test_redispatch_overwrites_single_entry() {
        let provider = Arc::new(MockBookingProvider::fixed(0.0).script("Oslo", vec![quote(100.0), quote(110.0)]));
        let d = dispatcher(provider, 1, 5);
        let s = span("h1", "Oslo");

        d.dispatch("trip", &s).await.unwrap();
        d.dispatch("trip", &s).await.unwrap();
        assert_eq!(d.cache().trip_len("trip"), 1);
        assert_eq!(d.cache().get("trip", "h1").unwrap().entry.price, 110.0);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_single_entry() {
        let provider = Arc::new(MockBookingProvider::fixed(70.0).with_delay(Duration::from_millis(20)));
        let d = dispatcher(provider.clone(), 1, 5);
        let s = span("h1", "Oslo");

        let results = futures::future::join_all((0..8).map(|_| d.dispatch("trip", &s))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(provider.calls(), 8);
        assert_eq!(d.cache().trip_len("trip"), 1);
    }

    #[tokio::test]
    async fn test_breaker_short_circuits_destination() {
        let provider = Arc::new(MockBookingProvider::failing(BookingError::from_status(503, "down")));
        let d = dispatcher(provider.clone(), 1, 2);

        assert!(d.dispatch("trip", &span("a", "Oslo")).await.is_err());
        assert!(d.dispatch("trip", &span("b", "Oslo")).await.is_err());
        assert_eq!(provider.calls(), 2);

        let err = d.dispatch("trip", &span("c", "Oslo")).await.unwrap_err();
        assert!(matches!(err, BookingError::CircuitOpen { .. }));
        assert_eq!(provider.calls(), 2);

        // other destinations are unaffected
        assert!(matches!(
            d.dispatch("trip", &span("d", "Bergen")).await,
            Err(BookingError::Transient { .. })
        ));
    }

    #[tokio::test]
    async fn test_half_open_sends_single_trial() {
        let provider = Arc::new(
            MockBookingProvider::fixed(55.0)
                .with_delay(Duration::from_millis(30))
                .script("Oslo", vec![Err(BookingError::from_status(503, "down"))]),
        );
        let d = BookingDispatcher::new(
            Some(provider.clone()),
            Arc::new(PriceCache::default()),
            BreakerConfig {
                threshold: 1,
                window: Duration::from_secs(60),
                cooldown: Duration::from_millis(50),
            },
            RetryPolicy::immediate(1),
        );
        assert!(d.dispatch("trip", &span("a", "Oslo")).await.is_err());
        tokio::time::sleep(Duration::from_millis(60)).await;

        let spans: Vec<Span> = (0..5).map(|i| span(&format!("s{}", i), "Oslo")).collect();
        let results = futures::future::join_all(spans.iter().map(|s| d.dispatch("trip", s))).await;

        assert_eq!(provider.calls(), 2);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(BookingError::CircuitOpen { .. })))
                .count(),
            4
        );
        // the trial succeeded, so the breaker is closed again
        assert!(d.dispatch("trip", &span("z", "Oslo")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let d = BookingDispatcher::new(
            None,
            Arc::new(PriceCache::default()),
            breaker(5),
            RetryPolicy::immediate(1),
        );
        assert!(!d.is_configured());
        assert_eq!(d.dispatch("trip", &span("a", "Oslo")).await, Err(BookingError::Unconfigured));
    }
}
