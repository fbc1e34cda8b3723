//! Booking price lookups: providers, breaker and dispatcher

mod breaker;
mod dispatcher;
mod error;
mod provider;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use dispatcher::BookingDispatcher;
pub use error::BookingError;
pub use provider::{BookingProvider, HttpBookingProvider, PriceQuote};

#[cfg(test)]
pub(crate) use provider::mock;
