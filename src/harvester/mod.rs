//! Batch orchestrator
//!
//! Drives the two-phase workflow: enumeration of agent identifiers from the
//! paginated listing endpoint, then one detail fetch per identifier with
//! results streamed to the NDJSON sink. Both phases use the same batching
//! pattern — fixed-size groups dispatched concurrently, settled together,
//! with a politeness pause between groups — and the same per-item retry
//! policy. Partial failure never aborts a phase: a failed item contributes
//! one error-log entry and nothing else.
//!
//! Submodules:
//! - [`enumerate`] - Phase 1: page 0 probe, page-count derivation, batched listing pages
//! - [`details`] - Phase 2: batched detail fetches with write-at-settlement

mod details;
mod enumerate;

use crate::api::DirectoryApi;
use crate::cache::{CacheValue, ResponseCache};
use crate::client::FetchClient;
use crate::config::Config;
use crate::error::{Error, FetchError, Result};
use crate::identity::{CredentialSource, HttpCredentialSource, IdentityPool};
use crate::output::NdjsonWriter;
use crate::types::{Event, RunSummary};
use reqwest::header::HeaderMap;
use std::sync::Arc;

/// Number of error-log entries echoed into the end-of-run summary
const SUMMARY_ERROR_PREVIEW: usize = 10;

/// Event broadcast buffer; slow subscribers lag rather than block the run
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Two-phase harvest orchestrator
///
/// Constructed once at process start with its collaborators injected; no
/// module-level global state. Cheap to share behind `Arc`; one `run` per
/// instance at a time is the intended usage.
pub struct Harvester {
    config: Arc<Config>,
    api: DirectoryApi,
    client: Arc<FetchClient>,
    identities: Arc<IdentityPool>,
    cache: Arc<ResponseCache>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl Harvester {
    /// Create a harvester whose identity pool talks to the configured
    /// credential service
    pub async fn new(config: Config) -> Result<Self> {
        let source = Arc::new(HttpCredentialSource::new(
            config.proxy_service.endpoint.clone(),
            config.proxy_service.api_token.clone(),
        ));
        Self::with_credential_source(config, source).await
    }

    /// Create a harvester with a custom credential source
    ///
    /// The seam for embedding: tests and callers with their own proxy supply
    /// inject an implementation of [`CredentialSource`] here.
    pub async fn with_credential_source(
        config: Config,
        source: Arc<dyn CredentialSource>,
    ) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(ResponseCache::open(&config.fetch.cache_dir).await?);
        let identities = Arc::new(IdentityPool::new(source, config.fetch.request_timeout));
        let client = Arc::new(FetchClient::new(cache.clone(), identities.clone()));
        let api = DirectoryApi::new(&config.api);
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            api,
            client,
            identities,
            cache,
            event_tx,
        })
    }

    /// Subscribe to run events
    ///
    /// Multiple subscribers are supported; each receives every event emitted
    /// after its subscription.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Size of the identity pool, once its lazy population has happened
    pub fn identity_pool_size(&self) -> Option<usize> {
        self.identities.size()
    }

    /// Sweep the response cache, deleting expired entries
    ///
    /// Out-of-band housekeeping; a run never calls this itself.
    pub async fn purge_expired_cache(&self) -> Result<usize> {
        self.cache.purge_expired().await
    }

    /// Execute a full harvest run
    ///
    /// Truncates the output file, enumerates identifiers (phase 1), fetches
    /// and streams detail records (phase 2), then closes the sink and logs a
    /// summary. Only two conditions abort the run: the first listing page
    /// staying unavailable after its retry budget, and output-sink I/O
    /// failures. Every per-item failure is logged, skipped, and reported in
    /// the returned [`RunSummary`].
    ///
    /// Output record order is completion order within each batch, not input
    /// order.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut errors: Vec<String> = Vec::new();

        tracing::info!(
            output = %self.config.output.path.display(),
            page_size = self.config.api.page_size,
            batch_size = self.config.batch.batch_size,
            "starting harvest run"
        );

        // Truncation of a previous run's file is an explicit precondition,
        // done before any fetch so a fatal enumeration leaves no stale data.
        let mut writer = NdjsonWriter::create(&self.config.output.path).await?;

        let enumeration = self.enumerate(&mut errors).await?;
        tracing::info!(
            agents = enumeration.ids.len(),
            pages = enumeration.page_count,
            pages_failed = enumeration.pages_failed,
            "enumeration complete"
        );

        self.fetch_details(&enumeration.ids, &mut writer, &mut errors)
            .await?;

        let records_written = writer.finish().await?;

        let summary = RunSummary {
            total_count: enumeration.total_count,
            page_count: enumeration.page_count,
            pages_failed: enumeration.pages_failed,
            agents_discovered: enumeration.ids.len(),
            records_written,
            errors,
        };

        self.log_summary(&summary);
        self.emit(Event::Completed {
            agents_discovered: summary.agents_discovered,
            records_written: summary.records_written,
            errors: summary.errors.len(),
        });

        Ok(summary)
    }

    /// Fetch one URL through the cache-aware client and require a JSON body
    pub(crate) async fn fetch_json(&self, url: &str) -> Result<serde_json::Value> {
        let value = self
            .client
            .fetch(url, &HeaderMap::new(), self.config.fetch.cache_ttl)
            .await?;
        match value {
            CacheValue::Json(json) => Ok(json),
            CacheValue::Text(_) => Err(Error::Fetch(FetchError::UnexpectedBody {
                url: url.to_string(),
                reason: "expected a JSON body".to_string(),
            })),
        }
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine; the channel is purely an observation seam
        let _ = self.event_tx.send(event);
    }

    fn log_summary(&self, summary: &RunSummary) {
        tracing::info!(
            total = summary.total_count,
            discovered = summary.agents_discovered,
            written = summary.records_written,
            errors = summary.errors.len(),
            "harvest run finished"
        );
        for line in summary.errors.iter().take(SUMMARY_ERROR_PREVIEW) {
            tracing::warn!(error = %line, "run error");
        }
        if summary.errors.len() > SUMMARY_ERROR_PREVIEW {
            tracing::warn!(
                omitted = summary.errors.len() - SUMMARY_ERROR_PREVIEW,
                "additional errors omitted from summary"
            );
        }
    }
}

impl std::fmt::Debug for Harvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("api", &self.api)
            .field("identity_pool_size", &self.identities.size())
            .finish()
    }
}
