//! Trip planner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Main trip planner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR), overridden by --log-level
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Planning LLM provider
    pub llm: LlmConfig,

    /// Plan generation retry budget
    pub planner: PlannerConfig,

    /// External booking price source
    pub booking: BookingConfig,

    /// Dispatch retries and circuit breaker
    pub dispatch: DispatchConfig,

    /// Price cache
    pub cache: CacheConfig,

    /// Live refresh fan-out
    pub refresh: RefreshConfig,

    /// Destination content enrichment
    pub enrichment: EnrichmentConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before planning
    ///
    /// Checks that the LLM API key environment variable is set so a plan
    /// request fails fast with a clear message.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key().is_none() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .tripplanner.yml
        let local_config = PathBuf::from(".tripplanner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/tripplanner/tripplanner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripplanner").join("tripplanner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai" or "anthropic"
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 8192,
            timeout_ms: 120_000,
        }
    }
}

/// Plan generation retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Attempts before giving up with a plan generation error
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Token budget requested per plan
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Directory of `.pmt` files overriding the built-in prompts
    #[serde(rename = "prompts-dir")]
    pub prompts_dir: Option<PathBuf>,
}

impl PlannerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.initial_backoff_ms, self.max_backoff_ms)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 8000,
            max_tokens: 8192,
            prompts_dir: None,
        }
    }
}

/// Booking price source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Base URL of the pricing API; unset means no live source
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    /// Environment variable holding the pricing API key (optional)
    #[serde(rename = "api-key-env")]
    pub api_key_env: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// JSON pointer to the price in a quote response
    #[serde(rename = "price-pointer")]
    pub price_pointer: String,

    /// JSON pointer to the currency in a quote response
    #[serde(rename = "currency-pointer")]
    pub currency_pointer: String,

    /// Currency assumed when the response has none
    #[serde(rename = "default-currency")]
    pub default_currency: String,
}

impl BookingConfig {
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env.as_ref().and_then(|var| std::env::var(var).ok())
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: None,
            timeout_ms: 10_000,
            price_pointer: "/price".to_string(),
            currency_pointer: "/currency".to_string(),
            default_currency: "USD".to_string(),
        }
    }
}

/// Dispatch retry and circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Consecutive failures that open the breaker for a destination/kind
    #[serde(rename = "breaker-threshold")]
    pub breaker_threshold: u32,

    /// Failures older than this no longer count toward the threshold
    #[serde(rename = "breaker-window-secs")]
    pub breaker_window_secs: u64,

    /// How long an open breaker short-circuits dispatches
    #[serde(rename = "breaker-cooldown-secs")]
    pub breaker_cooldown_secs: u64,
}

impl DispatchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.initial_backoff_ms, self.max_backoff_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
            breaker_threshold: 5,
            breaker_window_secs: 60,
            breaker_cooldown_secs: 300,
        }
    }
}

/// Price cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a fetched price
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 4 * 60 * 60 }
    }
}

/// Live refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Maximum concurrent span dispatches per refresh
    #[serde(rename = "max-parallelism")]
    pub max_parallelism: usize,

    /// Overall deadline for one refresh request
    #[serde(rename = "deadline-ms")]
    pub deadline_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 8,
            deadline_ms: 15_000,
        }
    }
}

/// Destination content enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,

    /// Concurrent source fetches per lookup
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: usize,

    /// Timeout for each source fetch
    #[serde(rename = "source-timeout-ms")]
    pub source_timeout_ms: u64,

    /// Text kept from each source after HTML to markdown conversion
    #[serde(rename = "max-chars-per-source")]
    pub max_chars_per_source: usize,

    /// Optional YAML file replacing the built-in destination catalog
    #[serde(rename = "catalog-path")]
    pub catalog_path: Option<PathBuf>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrency: 4,
            source_timeout_ms: 8000,
            max_chars_per_source: 4000,
            catalog_path: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for trip store data
    #[serde(rename = "store-dir")]
    pub store_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // XDG data directory (~/.local/share/tripplanner on Linux)
        let store_dir = dirs::data_dir()
            .map(|d| d.join("tripplanner").join("trips"))
            .unwrap_or_else(|| PathBuf::from(".tripstore"))
            .to_string_lossy()
            .into_owned();

        Self { store_dir }
    }
}
