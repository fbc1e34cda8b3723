//! Circuit breaker per (destination, service kind)
//!
//! Closed: dispatches pass; consecutive failures are counted, and a failure
//! older than the window restarts the count. Open: once the count reaches the
//! threshold every dispatch is refused until the cooldown elapses. Half-open:
//! after the cooldown one trial dispatch passes while the rest are refused; a
//! success closes the breaker and a failure re-opens it. A trial that never
//! reports back (aborted at a refresh deadline) is given up after another
//! cooldown.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::domain::{ServiceKind, normalize_text};

/// Breaker tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub threshold: u32,
    pub window: Duration,
    pub cooldown: Duration,
}

impl From<&DispatchConfig> for BreakerConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            threshold: config.breaker_threshold.max(1),
            window: Duration::from_secs(config.breaker_window_secs),
            cooldown: Duration::from_secs(config.breaker_cooldown_secs),
        }
    }
}

/// Breaker state as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { retry_in: Duration },
    HalfOpen,
}

#[derive(Debug, Default)]
struct Slot {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
}

type Key = (String, ServiceKind);

/// Tracks upstream health per destination and service kind
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    slots: Mutex<HashMap<Key, Slot>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        debug!(?config, "CircuitBreaker::new: called");
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn key(destination: &str, kind: ServiceKind) -> Key {
        (normalize_text(destination), kind)
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<Key, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state at `now`
    pub fn state_at(&self, destination: &str, kind: ServiceKind, now: Instant) -> BreakerState {
        let slots = self.slots();
        let Some(slot) = slots.get(&Self::key(destination, kind)) else {
            return BreakerState::Closed;
        };
        match slot.opened_at {
            Some(opened) => {
                let elapsed = now.saturating_duration_since(opened);
                if elapsed < self.config.cooldown {
                    BreakerState::Open {
                        retry_in: self.config.cooldown - elapsed,
                    }
                } else {
                    BreakerState::HalfOpen
                }
            }
            None => BreakerState::Closed,
        }
    }

    pub fn state(&self, destination: &str, kind: ServiceKind) -> BreakerState {
        self.state_at(destination, kind, Instant::now())
    }

    /// Ok when a dispatch may proceed, Err with the remaining wait otherwise
    ///
    /// In half-open state the first caller becomes the trial; others get
    /// `Err(Duration::ZERO)` until it reports back.
    pub fn check_at(&self, destination: &str, kind: ServiceKind, now: Instant) -> Result<(), Duration> {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&Self::key(destination, kind)) else {
            return Ok(());
        };
        let Some(opened) = slot.opened_at else {
            return Ok(());
        };

        let elapsed = now.saturating_duration_since(opened);
        if elapsed < self.config.cooldown {
            return Err(self.config.cooldown - elapsed);
        }
        match slot.trial_started {
            Some(started) if now.saturating_duration_since(started) < self.config.cooldown => Err(Duration::ZERO),
            _ => {
                debug!(%destination, %kind, "CircuitBreaker::check_at: admitting trial dispatch");
                slot.trial_started = Some(now);
                Ok(())
            }
        }
    }

    pub fn record_success(&self, destination: &str, kind: ServiceKind) {
        let mut slots = self.slots();
        if let Some(slot) = slots.remove(&Self::key(destination, kind)) {
            if slot.opened_at.is_some() {
                info!(%destination, %kind, "Circuit closed after successful trial");
            }
        }
    }

    pub fn record_failure_at(&self, destination: &str, kind: ServiceKind, now: Instant) {
        let mut slots = self.slots();
        let slot = slots.entry(Self::key(destination, kind)).or_default();

        if let Some(opened) = slot.opened_at {
            if now.saturating_duration_since(opened) >= self.config.cooldown {
                // failed half-open trial
                slot.opened_at = Some(now);
                slot.last_failure = Some(now);
                slot.trial_started = None;
                warn!(%destination, %kind, "Circuit re-opened after failed trial");
            }
            return;
        }

        let within_window = slot
            .last_failure
            .map(|last| now.saturating_duration_since(last) <= self.config.window)
            .unwrap_or(false);
        slot.consecutive_failures = if within_window { slot.consecutive_failures + 1 } else { 1 };
        slot.last_failure = Some(now);

        if slot.consecutive_failures >= self.config.threshold {
            slot.opened_at = Some(now);
            warn!(
                %destination,
                %kind,
                failures = slot.consecutive_failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Circuit opened"
            );
        }
    }

    pub fn record_failure(&self, destination: &str, kind: ServiceKind) {
        self.record_failure_at(destination, kind, Instant::now())
    }
}
