//! # agent-harvest
//!
//! Batch harvesting library for paginated directory APIs.
//!
//! agent-harvest enumerates records from a paginated remote listing endpoint,
//! then fetches a detail document per record, streaming results as
//! newline-delimited JSON. The core is a bounded-concurrency fetch engine:
//!
//! - **Cache-first fetching** - a persistent response cache keyed by request
//!   fingerprint deduplicates requests across runs
//! - **Identity rotation** - outbound requests round-robin over a pool of
//!   proxy identities and emulated-browser header sets
//! - **Partial-failure tolerance** - per-item retry with a flat delay; items
//!   that exhaust their budget are logged and skipped, never fatal
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use agent_harvest::{ApiConfig, Config, Harvester, ProxyServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         api: ApiConfig {
//!             listing_url: "https://api.example.com/agents?page={page}&size={page_size}"
//!                 .to_string(),
//!             detail_url: "https://api.example.com/agents/{id}".to_string(),
//!             ..Default::default()
//!         },
//!         proxy_service: ProxyServiceConfig {
//!             endpoint: "https://proxies.example.com/list".to_string(),
//!             api_token: Some("token".to_string()),
//!         },
//!         ..Default::default()
//!     };
//!
//!     let harvester = Harvester::new(config).await?;
//!     let summary = harvester.run().await?;
//!     println!(
//!         "wrote {} of {} records",
//!         summary.records_written, summary.total_count
//!     );
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote API URL templates and response shapes
pub mod api;
/// Persistent response cache and request fingerprinting
pub mod cache;
/// Cache-aware single-attempt fetch client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Batch orchestrator (enumeration and detail phases)
pub mod harvester;
/// Rotating emulated-browser header sets
pub mod headers;
/// Proxy identity pool and rotation
pub mod identity;
/// NDJSON output sink
pub mod output;
/// Flat-delay retry logic
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use cache::{CacheValue, ResponseCache, fingerprint};
pub use client::FetchClient;
pub use config::{
    ApiConfig, BatchConfig, Config, FetchConfig, OutputConfig, ProxyServiceConfig, RetryConfig,
};
pub use error::{CacheError, Error, FetchError, IdentityError, Result};
pub use harvester::Harvester;
pub use identity::{CredentialSource, HttpCredentialSource, Identity, IdentityLease, IdentityPool};
pub use output::NdjsonWriter;
pub use types::{AgentId, Event, RunSummary};
