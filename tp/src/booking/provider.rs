//! Booking price sources
//!
//! A provider executes one synthesized call specification and reports a
//! price or a typed failure. Credentials and the base URL are added at
//! execution time and never stored in the span.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::BookingError;
use crate::config::BookingConfig;
use crate::domain::ApiSpec;

/// A price returned by a booking source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub currency: String,
}

/// External price lookup
#[async_trait]
pub trait BookingProvider: Send + Sync {
    /// Perform exactly one lookup
    async fn execute(&self, spec: &ApiSpec) -> Result<PriceQuote, BookingError>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// HTTP/JSON booking source
pub struct HttpBookingProvider {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
    price_pointer: String,
    currency_pointer: String,
    default_currency: String,
}

impl HttpBookingProvider {
    /// Build a provider, or `None` when no live source is configured
    pub fn from_config(config: &BookingConfig) -> Result<Option<Self>, BookingError> {
        debug!(base_url = ?config.base_url, "HttpBookingProvider::from_config: called");
        let Some(base_url) = config.base_url.as_deref() else {
            return Ok(None);
        };
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| BookingError::Permanent {
            status: None,
            message: format!("invalid booking base-url '{}': {}", base_url, e),
        })?;
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(|e| BookingError::Permanent {
            status: None,
            message: format!("failed to build HTTP client: {}", e),
        })?;
        Ok(Some(Self {
            http,
            base_url,
            api_key: config.api_key(),
            timeout,
            price_pointer: config.price_pointer.clone(),
            currency_pointer: config.currency_pointer.clone(),
            default_currency: config.default_currency.clone(),
        }))
    }

    /// Full request URL for a stored spec
    ///
    /// Specs carry a path that is joined onto the configured base. An absolute
    /// URL is only accepted on the configured origin, so credentials never
    /// leave it.
    fn request_url(&self, spec_url: &str) -> Result<Url, BookingError> {
        if spec_url.starts_with('/') {
            let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), spec_url);
            return Url::parse(&joined).map_err(|e| BookingError::Permanent {
                status: None,
                message: format!("invalid request url '{}': {}", joined, e),
            });
        }

        let url = Url::parse(spec_url).map_err(|e| BookingError::Permanent {
            status: None,
            message: format!("invalid request url '{}': {}", spec_url, e),
        })?;
        if url.origin() != self.base_url.origin() {
            return Err(BookingError::Permanent {
                status: None,
                message: format!(
                    "refusing request to {} outside the configured booking source",
                    url.origin().ascii_serialization()
                ),
            });
        }
        Ok(url)
    }

    /// Pull price and currency out of a quote document
    fn parse_quote(&self, body: &Value) -> Result<PriceQuote, BookingError> {
        let price = match body.pointer(&self.price_pointer) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or_else(|| BookingError::Permanent {
            status: None,
            message: format!("no usable price at {}", self.price_pointer),
        })?;

        let currency = body
            .pointer(&self.currency_pointer)
            .and_then(Value::as_str)
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.default_currency.clone());

        Ok(PriceQuote { price, currency })
    }
}

#[async_trait]
impl BookingProvider for HttpBookingProvider {
    async fn execute(&self, spec: &ApiSpec) -> Result<PriceQuote, BookingError> {
        debug!(method = %spec.method, url = %spec.url, "HttpBookingProvider::execute: called");
        let method = Method::from_bytes(spec.method.as_bytes()).map_err(|_| BookingError::Permanent {
            status: None,
            message: format!("invalid method '{}'", spec.method),
        })?;

        let url = self.request_url(&spec.url)?;
        let mut request = self.http.request(method, url).query(&spec.query);
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(ref body) = spec.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BookingError::Transient {
                    status: None,
                    message: format!("timed out after {:?}", self.timeout),
                }
            } else if e.is_builder() {
                BookingError::Permanent {
                    status: None,
                    message: e.to_string(),
                }
            } else {
                BookingError::Transient {
                    status: None,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "HttpBookingProvider::execute: error status");
            return Err(BookingError::from_status(status.as_u16(), text));
        }

        let body: Value = response.json().await.map_err(|e| BookingError::Permanent {
            status: Some(status.as_u16()),
            message: format!("response is not JSON: {}", e),
        })?;
        self.parse_quote(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}
