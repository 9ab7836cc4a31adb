//! Cache-aware fetch client
//!
//! Composes the response cache, identity pool, and header rotation into a
//! single `fetch` operation with cache-first semantics. This component makes
//! exactly one attempt per call and never retries: retry policy lives with
//! the orchestrator, which keeps this contract a pure request/cache
//! interaction.

use crate::cache::{CacheValue, ResponseCache, fingerprint};
use crate::error::{FetchError, Result};
use crate::headers::HeaderRotator;
use crate::identity::IdentityPool;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;

/// Single-attempt fetch operation over cache + rotating identities
#[derive(Debug)]
pub struct FetchClient {
    cache: Arc<ResponseCache>,
    identities: Arc<IdentityPool>,
    headers: HeaderRotator,
}

impl FetchClient {
    /// Create a fetch client over the given cache and identity pool
    pub fn new(cache: Arc<ResponseCache>, identities: Arc<IdentityPool>) -> Self {
        Self {
            cache,
            identities,
            headers: HeaderRotator::new(),
        }
    }

    /// Fetch `url`, consulting the cache first
    ///
    /// 1. A live cache entry for the (url, session-headers) fingerprint is
    ///    returned immediately — no network call, no identity acquired.
    /// 2. Otherwise a full rotated header set is synthesized (caller headers
    ///    win on conflict), an identity is acquired, and one GET is performed
    ///    with the pool's fixed timeout.
    /// 3. A success response is written through to the cache under the given
    ///    TTL (non-positive TTL skips the write) and returned.
    ///
    /// Failures — network errors, timeouts, non-success statuses — propagate
    /// untouched.
    pub async fn fetch(
        &self,
        url: &str,
        extra_headers: &HeaderMap,
        ttl: Duration,
    ) -> Result<CacheValue> {
        let key = fingerprint(url, extra_headers);

        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(url, "cache hit");
            return Ok(cached);
        }

        let headers = self.headers.next_headers(extra_headers);
        let lease = self.identities.acquire().await?;

        tracing::debug!(url, proxy = %lease.identity.address, "cache miss, fetching");

        let response = lease.client.get(url).headers(headers).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let text = response.text().await?;
        let value = match serde_json::from_str(&text) {
            Ok(json) => CacheValue::Json(json),
            Err(_) => CacheValue::Text(text),
        };

        // Write-through is best-effort: a failed cache write must not fail
        // a fetch that already succeeded on the network.
        if let Err(e) = self.cache.set(&key, value.clone(), ttl).await {
            tracing::warn!(url, error = %e, "failed to cache response");
        }

        Ok(value)
    }
}
