//! Bounded-concurrency enrichment fetch
//!
//! Each selected source runs in its own task under a shared semaphore and its
//! own timeout. Failures are logged and dropped; when nothing comes back the
//! result is [`Enrichment::Empty`], never an error.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::catalog::DestinationCatalog;
use super::source::{ContentSource, FetchError};
use crate::config::EnrichmentConfig;
use crate::retry::{RetryPolicy, retry};

/// Text pulled from one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceContent {
    pub url: String,
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Enrichment {
    Content {
        /// Catalog destination name, `None` for fallback search results
        destination: Option<String>,
        sources: Vec<SourceContent>,
    },
    Empty,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Aggregated text for prompts, one section per source
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Content { sources, .. } => Some(
                sources
                    .iter()
                    .map(|s| format!("## Source: {}\n\n{}", s.url, s.text.trim()))
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            ),
        }
    }
}

pub struct EnrichmentFetcher {
    catalog: Arc<DestinationCatalog>,
    source: Arc<dyn ContentSource>,
    enabled: bool,
    max_concurrency: usize,
    source_timeout: Duration,
    max_chars: usize,
    policy: RetryPolicy,
}

impl EnrichmentFetcher {
    pub fn new(catalog: Arc<DestinationCatalog>, source: Arc<dyn ContentSource>, config: &EnrichmentConfig) -> Self {
        Self {
            catalog,
            source,
            enabled: config.enabled,
            max_concurrency: config.max_concurrency.max(1),
            source_timeout: Duration::from_millis(config.source_timeout_ms),
            max_chars: config.max_chars_per_source,
            policy: RetryPolicy::new(2, 250, 1000),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn catalog(&self) -> &DestinationCatalog {
        &self.catalog
    }

    /// Gather context for a free-text location
    pub async fn fetch(&self, location: &str) -> Enrichment {
        debug!(%location, "EnrichmentFetcher::fetch: called");
        if !self.enabled {
            debug!("EnrichmentFetcher::fetch: disabled");
            return Enrichment::Empty;
        }

        let selection = self.catalog.select(location);
        if selection.urls.is_empty() {
            debug!("EnrichmentFetcher::fetch: no sources selected");
            return Enrichment::Empty;
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        for (index, url) in selection.urls.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let source = self.source.clone();
            let policy = self.policy.clone();
            let timeout = self.source_timeout;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = retry(&policy, &url, |_| async {
                    match tokio::time::timeout(timeout, source.fetch(&url)).await {
                        Ok(result) => result,
                        Err(_) => Err(FetchError::Timeout(timeout)),
                    }
                })
                .await;
                (index, url, result)
            });
        }

        let mut fetched = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, url, Ok(text))) => fetched.push((index, self.truncate(url, text))),
                Ok((_, url, Err(e))) => warn!(%url, error = %e, "Enrichment source failed"),
                Err(e) => warn!(error = %e, "Enrichment task panicked"),
            }
        }

        fetched.retain(|(_, s)| !s.text.trim().is_empty());
        if fetched.is_empty() {
            info!(%location, "No enrichment content available");
            return Enrichment::Empty;
        }

        fetched.sort_by_key(|(index, _)| *index);
        info!(%location, destination = ?selection.destination, sources = fetched.len(), "Enrichment gathered");
        Enrichment::Content {
            destination: selection.destination,
            sources: fetched.into_iter().map(|(_, s)| s).collect(),
        }
    }

    fn truncate(&self, url: String, text: String) -> SourceContent {
        match text.char_indices().nth(self.max_chars) {
            Some((cut, _)) => SourceContent {
                url,
                text: text[..cut].to_string(),
                truncated: true,
            },
            None => SourceContent {
                url,
                text,
                truncated: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::catalog::{Destination, FallbackSource};
    use crate::enrich::source::mock::MockContentSource;
    use std::time::Instant;

    fn catalog() -> Arc<DestinationCatalog> {
        Arc::new(DestinationCatalog::new(
            vec![Destination {
                name: "Tokyo".to_string(),
                country: Some("Japan".to_string()),
                aliases: vec!["tyo".to_string()],
                sources: vec!["http://t/1".to_string(), "http://t/2".to_string(), "http://t/3".to_string()],
            }],
            vec![FallbackSource {
                url: "http://search.test/".to_string(),
                param: "q".to_string(),
            }],
        ))
    }

    fn config() -> EnrichmentConfig {
        EnrichmentConfig {
            enabled: true,
            max_concurrency: 3,
            source_timeout_ms: 200,
            max_chars_per_source: 100,
            catalog_path: None,
        }
    }

    fn fetcher(source: MockContentSource, config: &EnrichmentConfig) -> EnrichmentFetcher {
        EnrichmentFetcher::new(catalog(), Arc::new(source), config).with_retry_policy(RetryPolicy::immediate(1))
    }

    #[tokio::test]
    async fn test_catalog_hit_aggregates_in_order() {
        let source = MockContentSource::new()
            .page("http://t/1", "one")
            .page("http://t/2", "two")
            .page("http://t/3", "three");
        let result = fetcher(source, &config()).fetch("Tokyo").await;

        match &result {
            Enrichment::Content { destination, sources } => {
                assert_eq!(destination.as_deref(), Some("Tokyo"));
                let urls: Vec<_> = sources.iter().map(|s| s.url.as_str()).collect();
                assert_eq!(urls, vec!["http://t/1", "http://t/2", "http://t/3"]);
            }
            Enrichment::Empty => panic!("expected content"),
        }
        let text = result.text().unwrap();
        assert!(text.find("one").unwrap() < text.find("three").unwrap());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes() {
        let source = MockContentSource::new()
            .page("http://t/1", "one")
            .error("http://t/2", FetchError::Status(404));
        let result = fetcher(source, &config()).fetch("tyo").await;

        match result {
            Enrichment::Content { sources, .. } => assert_eq!(sources.len(), 1),
            Enrichment::Empty => panic!("expected content"),
        }
    }

    #[tokio::test]
    async fn test_miss_uses_fallback() {
        let source = MockContentSource::new().page("http://search.test/?q=Lima", "lima results");
        let result = fetcher(source, &config()).fetch("Lima").await;

        match result {
            Enrichment::Content { destination, sources } => {
                assert!(destination.is_none());
                assert_eq!(sources[0].text, "lima results");
            }
            Enrichment::Empty => panic!("expected fallback content"),
        }
    }

    #[tokio::test]
    async fn test_all_sources_unreachable_is_empty() {
        let result = fetcher(MockContentSource::new(), &config()).fetch("Tokyo").await;
        assert_eq!(result, Enrichment::Empty);
        assert!(result.text().is_none());
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let source = MockContentSource::new()
            .page("http://t/1", "fast")
            .page("http://t/2", "slow")
            .delay("http://t/2", Duration::from_secs(5));
        let start = Instant::now();
        let result = fetcher(source, &config()).fetch("Tokyo").await;

        assert!(start.elapsed() < Duration::from_secs(2));
        match result {
            Enrichment::Content { sources, .. } => {
                assert_eq!(sources.len(), 1);
                assert_eq!(sources[0].text, "fast");
            }
            Enrichment::Empty => panic!("expected content"),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let source = Arc::new(MockContentSource::new().error("http://t/1", FetchError::Status(503)));
        let fetcher = EnrichmentFetcher::new(catalog(), source.clone(), &config())
            .with_retry_policy(RetryPolicy::immediate(3));
        let result = fetcher.fetch("Tokyo").await;

        assert!(result.is_empty());
        let calls = source.calls();
        assert_eq!(calls.iter().filter(|u| *u == "http://t/1").count(), 3);
        // unknown urls fail with a network error, also retried
        assert_eq!(calls.len(), 9);
    }

    #[tokio::test]
    async fn test_truncates_per_source() {
        let long = "é".repeat(500);
        let source = MockContentSource::new().page("http://t/1", &long);
        let result = fetcher(source, &config()).fetch("Tokyo").await;

        match result {
            Enrichment::Content { sources, .. } => {
                assert_eq!(sources[0].text.chars().count(), 100);
                assert!(sources[0].truncated);
            }
            Enrichment::Empty => panic!("expected content"),
        }
    }

    #[tokio::test]
    async fn test_disabled_returns_empty() {
        let mut cfg = config();
        cfg.enabled = false;
        let source = Arc::new(MockContentSource::new().page("http://t/1", "one"));
        let fetcher = EnrichmentFetcher::new(catalog(), source.clone(), &cfg);

        assert!(fetcher.fetch("Tokyo").await.is_empty());
        assert!(source.calls().is_empty());
    }
}
