//! Shared fakes for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tripplanner::booking::{BookingError, BookingProvider, PriceQuote};
use tripplanner::domain::ApiSpec;
use tripplanner::enrich::{ContentSource, FetchError};
use tripplanner::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};

/// Replays canned model answers in order, then repeats the last one
pub struct ScriptedLlm {
    answers: Vec<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<CompletionRequest> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.prompts.lock().unwrap().push(request);
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answers
            .get(idx)
            .or_else(|| self.answers.last())
            .cloned()
            .unwrap_or_default();
        Ok(CompletionResponse::text(answer))
    }

    fn provider(&self) -> &str {
        "scripted"
    }
}

/// Booking source with per-destination latency and failures
///
/// Tracks how many lookups are in flight at once.
pub struct FakeBookingSource {
    price: f64,
    delay: Duration,
    slow: HashMap<String, Duration>,
    failing: HashSet<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeBookingSource {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            delay: Duration::ZERO,
            slow: HashMap::new(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn slow(mut self, place: &str, delay: Duration) -> Self {
        self.slow.insert(place.to_string(), delay);
        self
    }

    pub fn failing(mut self, place: &str) -> Self {
        self.failing.insert(place.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn place(spec: &ApiSpec) -> String {
    spec.query
        .get("location")
        .or_else(|| spec.query.get("destination"))
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl BookingProvider for FakeBookingSource {
    async fn execute(&self, spec: &ApiSpec) -> Result<PriceQuote, BookingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let place = place(spec);
        let delay = self.slow.get(&place).copied().unwrap_or(self.delay);
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&place) {
            return Err(BookingError::from_status(503, "unavailable"));
        }
        Ok(PriceQuote {
            price: self.price,
            currency: "EUR".to_string(),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Content source answering from a fixed map; other URLs are unreachable
#[derive(Default)]
pub struct FakeWeb {
    pages: HashMap<String, String>,
    hits: Mutex<Vec<String>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for FakeWeb {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.hits.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Network("unreachable".to_string()))
    }
}
