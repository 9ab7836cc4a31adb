//! Configuration types for agent-harvest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Remote directory API configuration (URL templates, page size)
///
/// Groups settings describing the listing and detail endpoints.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listing endpoint URL template. Must contain the `{page}` and
    /// `{page_size}` placeholders, e.g.
    /// `https://api.example.com/agents?page={page}&size={page_size}`
    pub listing_url: String,

    /// Detail endpoint URL template. Must contain the `{id}` placeholder,
    /// e.g. `https://api.example.com/agents/{id}`
    pub detail_url: String,

    /// Number of records requested per listing page (default: 500)
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listing_url: String::new(),
            detail_url: String::new(),
            page_size: default_page_size(),
        }
    }
}

/// Fetch behavior configuration (timeout, response cache)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (default: 30 seconds)
    ///
    /// Exceeding it counts as an ordinary fetch failure, subject to the same
    /// retry policy as any other failure. There is no whole-run timeout.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Directory holding one cache file per request fingerprint
    /// (default: "./cache"). Created if absent.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Time-to-live for cached responses (default: 24 hours)
    ///
    /// A zero TTL disables cache writes entirely; reads still consult the
    /// directory so previously cached entries keep short-circuiting fetches
    /// until they expire.
    #[serde(default = "default_cache_ttl", with = "duration_serde")]
    pub cache_ttl: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            cache_dir: default_cache_dir(),
            cache_ttl: default_cache_ttl(),
        }
    }
}

/// Retry configuration for per-item failures
///
/// The delay is flat: every wait between attempts is the same fixed duration.
/// There is deliberately no multiplier or jitter knob — the engine sleeps
/// `delay` between attempts, nothing else.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per item, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (default: 2 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
        }
    }
}

/// Batch dispatch configuration (concurrency, politeness pause)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of fetches dispatched concurrently per batch (default: 10)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Sleep between consecutive batches (default: 1 second)
    #[serde(default = "default_inter_batch_delay", with = "duration_serde")]
    pub inter_batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay: default_inter_batch_delay(),
        }
    }
}

/// Credential service configuration for the identity pool
///
/// The service is called once per process, on first identity acquisition,
/// via an authenticated GET returning a list of proxy tuples.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProxyServiceConfig {
    /// Credential service endpoint URL
    pub endpoint: String,

    /// API token sent in the `Authorization` header
    #[serde(default)]
    pub api_token: Option<String>,
}

/// Output sink configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path of the NDJSON output file (default: "./output/agents.ndjson")
    ///
    /// Any pre-existing file at this path is truncated at the start of a run.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

/// Main configuration for [`Harvester`](crate::harvester::Harvester)
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) — endpoint templates and page size
/// - [`fetch`](FetchConfig) — request timeout and response cache
/// - [`retry`](RetryConfig) — per-item retry budget and flat delay
/// - [`batch`](BatchConfig) — batch size and inter-batch pause
/// - [`proxy_service`](ProxyServiceConfig) — credential service endpoint
/// - [`output`](OutputConfig) — NDJSON sink path
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote directory API endpoints
    pub api: ApiConfig,

    /// Fetch behavior (timeout, cache)
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Per-item retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Batch dispatch settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Credential service for the identity pool
    #[serde(default)]
    pub proxy_service: ProxyServiceConfig,

    /// Output sink settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Validate the configuration, returning the first problem found
    ///
    /// Checks the structural invariants the engine relies on: non-zero page
    /// and batch sizes, at least one retry attempt, and URL templates that
    /// actually carry their placeholders.
    pub fn validate(&self) -> Result<()> {
        if self.api.page_size == 0 {
            return Err(Error::Config {
                message: "page_size must be greater than zero".to_string(),
                key: Some("api.page_size".to_string()),
            });
        }
        if !self.api.listing_url.contains("{page}") || !self.api.listing_url.contains("{page_size}")
        {
            return Err(Error::Config {
                message: "listing_url must contain {page} and {page_size} placeholders"
                    .to_string(),
                key: Some("api.listing_url".to_string()),
            });
        }
        if !self.api.detail_url.contains("{id}") {
            return Err(Error::Config {
                message: "detail_url must contain the {id} placeholder".to_string(),
                key: Some("api.detail_url".to_string()),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".to_string(),
                key: Some("retry.max_attempts".to_string()),
            });
        }
        if self.batch.batch_size == 0 {
            return Err(Error::Config {
                message: "batch_size must be greater than zero".to_string(),
                key: Some("batch.batch_size".to_string()),
            });
        }
        if self.proxy_service.endpoint.is_empty() {
            return Err(Error::Config {
                message: "proxy_service.endpoint must be set".to_string(),
                key: Some("proxy_service.endpoint".to_string()),
            });
        }
        if let Err(e) = url::Url::parse(&self.proxy_service.endpoint) {
            return Err(Error::Config {
                message: format!("proxy_service.endpoint is not a valid URL: {e}"),
                key: Some("proxy_service.endpoint".to_string()),
            });
        }
        Ok(())
    }
}

fn default_page_size() -> u64 {
    500
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_batch_size() -> usize {
    10
}

fn default_inter_batch_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./output/agents.ndjson")
}

// Duration serialization helper (seconds as integers)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
