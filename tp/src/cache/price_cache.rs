//! PriceCache - TTL-bounded price snapshots per (trip, span)
//!
//! Storage is an arena per trip (a concurrent map of span id to entry) held
//! in a concurrent map of trips, so writers for unrelated trips never contend
//! on one lock. An entry is replaced whole, never edited in place, and its
//! expiry is fixed when it is written: reads never extend it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One cached price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceCacheEntry {
    pub price: f64,
    pub currency: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PriceCacheEntry {
    pub fn new(price: f64, currency: impl Into<String>, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| fetched_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            price,
            currency: currency.into(),
            fetched_at,
            expires_at,
        }
    }

    /// Stale at and after `fetched_at + ttl`
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Age of the entry at `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }
}

/// A cache read with its freshness classification
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub entry: PriceCacheEntry,
    pub is_stale: bool,
}

type Arena = DashMap<String, PriceCacheEntry>;

/// Concurrent price cache
#[derive(Debug)]
pub struct PriceCache {
    trips: DashMap<String, Arc<Arena>>,
    default_ttl: Duration,
}

impl PriceCache {
    pub fn new(default_ttl: Duration) -> Self {
        debug!(ttl_secs = default_ttl.as_secs(), "PriceCache::new: called");
        Self {
            trips: DashMap::new(),
            default_ttl,
        }
    }

    /// TTL applied by [`PriceCache::set_default`]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Current entry and staleness, or `None` if never fetched
    pub fn get(&self, trip_id: &str, span_id: &str) -> Option<CacheLookup> {
        self.get_at(trip_id, span_id, Utc::now())
    }

    /// Same as [`PriceCache::get`] with an explicit clock
    pub fn get_at(&self, trip_id: &str, span_id: &str, now: DateTime<Utc>) -> Option<CacheLookup> {
        let arena = self.arena(trip_id)?;
        let entry = arena.get(span_id)?.value().clone();
        let is_stale = entry.is_stale_at(now);
        Some(CacheLookup { entry, is_stale })
    }

    /// Replace the entry for (trip, span)
    pub fn set(
        &self,
        trip_id: &str,
        span_id: &str,
        price: f64,
        currency: &str,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> PriceCacheEntry {
        let entry = PriceCacheEntry::new(price, currency, fetched_at, ttl);
        self.put(trip_id, span_id, entry.clone());
        entry
    }

    /// Replace the entry using the cache's default TTL
    pub fn set_default(
        &self,
        trip_id: &str,
        span_id: &str,
        price: f64,
        currency: &str,
        fetched_at: DateTime<Utc>,
    ) -> PriceCacheEntry {
        self.set(trip_id, span_id, price, currency, fetched_at, self.default_ttl)
    }

    /// Store a prepared entry, replacing any prior one
    pub fn put(&self, trip_id: &str, span_id: &str, entry: PriceCacheEntry) {
        debug!(%trip_id, %span_id, price = entry.price, "PriceCache::put: called");
        let arena = self.trips.entry(trip_id.to_string()).or_default().clone();
        arena.insert(span_id.to_string(), entry);
    }

    /// Drop every entry of a trip, returning how many there were
    pub fn invalidate_trip(&self, trip_id: &str) -> usize {
        let removed = self.trips.remove(trip_id).map(|(_, arena)| arena.len()).unwrap_or(0);
        debug!(%trip_id, removed, "PriceCache::invalidate_trip: called");
        removed
    }

    /// Number of cached spans for a trip
    pub fn trip_len(&self, trip_id: &str) -> usize {
        self.arena(trip_id).map(|a| a.len()).unwrap_or(0)
    }

    /// Arena handle; the outer map guard is released before the caller reads
    fn arena(&self, trip_id: &str) -> Option<Arc<Arena>> {
        self.trips.get(trip_id).map(|a| a.value().clone())
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(4 * 60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_absent_when_never_fetched() {
        let cache = PriceCache::default();
        assert!(cache.get("trip", "span").is_none());
    }

    #[test]
    fn test_set_then_get() {
        let cache = PriceCache::default();
        cache.set("trip", "hotel-1", 180.0, "EUR", t0(), Duration::from_secs(60));

        let lookup = cache.get_at("trip", "hotel-1", t0()).unwrap();
        assert_eq!(lookup.entry.price, 180.0);
        assert_eq!(lookup.entry.currency, "EUR");
        assert!(!lookup.is_stale);

        let later = t0() + chrono::Duration::seconds(60);
        assert!(cache.get_at("trip", "hotel-1", later).unwrap().is_stale);
    }

    #[test]
    fn test_set_replaces_whole_entry() {
        let cache = PriceCache::default();
        cache.set("trip", "s", 100.0, "USD", t0(), Duration::from_secs(10));
        let newer = t0() + chrono::Duration::seconds(5);
        cache.set("trip", "s", 90.0, "EUR", newer, Duration::from_secs(3600));

        let lookup = cache.get_at("trip", "s", newer).unwrap();
        assert_eq!(lookup.entry.price, 90.0);
        assert_eq!(lookup.entry.currency, "EUR");
        assert_eq!(lookup.entry.fetched_at, newer);
        assert_eq!(cache.trip_len("trip"), 1);
    }

    #[test]
    fn test_reads_do_not_extend_ttl() {
        let cache = PriceCache::default();
        cache.set("trip", "s", 1.0, "USD", t0(), Duration::from_secs(10));
        for s in 0..9 {
            cache.get_at("trip", "s", t0() + chrono::Duration::seconds(s));
        }
        assert!(cache.get_at("trip", "s", t0() + chrono::Duration::seconds(10)).unwrap().is_stale);
    }

    #[test]
    fn test_invalidate_trip_is_scoped() {
        let cache = PriceCache::default();
        cache.set_default("a", "s1", 1.0, "USD", t0());
        cache.set_default("a", "s2", 2.0, "USD", t0());
        cache.set_default("b", "s1", 3.0, "USD", t0());

        assert_eq!(cache.invalidate_trip("a"), 2);
        assert!(cache.get("a", "s1").is_none());
        assert_eq!(cache.get_at("b", "s1", t0()).unwrap().entry.price, 3.0);
        assert_eq!(cache.invalidate_trip("missing"), 0);
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let entry = PriceCacheEntry::new(1.0, "USD", t0(), Duration::MAX);
        assert!(!entry.is_stale_at(t0() + chrono::Duration::days(365 * 100)));
    }

    #[tokio::test]
    async fn test_concurrent_writers_across_trips() {
        let cache = Arc::new(PriceCache::default());
        let mut handles = Vec::new();
        for t in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for s in 0..50 {
                    cache.set_default(&format!("trip-{t}"), &format!("span-{s}"), s as f64, "USD", Utc::now());
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        for t in 0..8 {
            assert_eq!(cache.trip_len(&format!("trip-{t}")), 50);
        }
    }

    proptest! {
        #[test]
        fn prop_staleness_boundary(ttl_secs in 1u64..86_400, offset in 0i64..172_800) {
            let cache = PriceCache::default();
            cache.set("trip", "span", 10.0, "USD", t0(), Duration::from_secs(ttl_secs));
            let now = t0() + chrono::Duration::seconds(offset);
            let lookup = cache.get_at("trip", "span", now).unwrap();
            prop_assert_eq!(lookup.is_stale, offset >= ttl_secs as i64);
        }
    }
}
