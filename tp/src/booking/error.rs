//! Booking lookup errors

use std::time::Duration;
use thiserror::Error;

use crate::domain::ServiceKind;
use crate::retry::Retryable;

/// Typed failure of one price lookup
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BookingError {
    /// Timeout, network failure, 408/429 or 5xx: worth retrying
    #[error("transient booking failure{}: {message}", status_suffix(.status))]
    Transient { status: Option<u16>, message: String },

    /// Malformed or rejected request: never retried
    #[error("booking request rejected{}: {message}", status_suffix(.status))]
    Permanent { status: Option<u16>, message: String },

    /// Breaker open for this destination and service kind
    #[error("circuit open for {kind} at '{destination}', retry in {}s", .retry_in.as_secs())]
    CircuitOpen {
        destination: String,
        kind: ServiceKind,
        retry_in: Duration,
    },

    /// No live booking source configured
    #[error("no booking source configured")]
    Unconfigured,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl BookingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BookingError::Transient { .. })
    }

    /// Classify an HTTP status from the booking source
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 408 || status == 429 || status >= 500 {
            BookingError::Transient {
                status: Some(status),
                message,
            }
        } else {
            BookingError::Permanent {
                status: Some(status),
                message,
            }
        }
    }
}

impl Retryable for BookingError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(BookingError::from_status(503, "down").is_transient());
        assert!(BookingError::from_status(500, "boom").is_transient());
        assert!(BookingError::from_status(429, "slow down").is_transient());
        assert!(BookingError::from_status(408, "timeout").is_transient());
        assert!(!BookingError::from_status(400, "bad").is_transient());
        assert!(!BookingError::from_status(404, "nope").is_transient());
    }

    #[test]
    fn test_display() {
        let err = BookingError::from_status(502, "bad gateway");
        assert_eq!(err.to_string(), "transient booking failure (HTTP 502): bad gateway");
        let err = BookingError::Permanent {
            status: None,
            message: "missing price".to_string(),
        };
        assert_eq!(err.to_string(), "booking request rejected: missing price");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(BookingError::from_status(503, "").is_retryable());
        assert!(!BookingError::Unconfigured.is_retryable());
        assert!(
            !BookingError::CircuitOpen {
                destination: "rome".to_string(),
                kind: ServiceKind::Hotel,
                retry_in: Duration::from_secs(1),
            }
            .is_retryable()
        );
    }
}
