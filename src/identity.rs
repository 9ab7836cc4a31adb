//! Outbound identity pool and rotation
//!
//! An identity is one egress proxy endpoint plus its credentials. The pool is
//! populated lazily from an external credential service on first acquisition
//! and held for the process lifetime; rotation is plain round-robin with no
//! health-awareness, so a consistently failing identity is handed out just as
//! often as a healthy one. The pool is never refreshed mid-run.

use crate::error::{IdentityError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

/// One rotating egress endpoint plus its credentials
///
/// Immutable once issued; requests borrow (clone) it, never consume it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Proxy network address
    #[serde(alias = "proxy_address")]
    pub address: String,
    /// Proxy port
    pub port: u16,
    /// Credential username
    pub username: String,
    /// Credential password
    pub password: String,
}

impl Identity {
    /// The proxy URL for this identity, without credentials
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

/// Source of proxy identities, called once to fill the pool
///
/// Implemented over HTTP by [`HttpCredentialSource`]; tests inject a static
/// list instead.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetch the full identity list from the credential service
    async fn fetch_identities(&self) -> std::result::Result<Vec<Identity>, IdentityError>;
}

/// Credential service response: a paginated list of proxy tuples
#[derive(Debug, Deserialize)]
struct CredentialListResponse {
    results: Vec<Identity>,
}

/// HTTP-backed credential source
///
/// Performs one authenticated GET against the configured endpoint and parses
/// the `{"results": [...]}` proxy list it returns.
#[derive(Clone, Debug)]
pub struct HttpCredentialSource {
    endpoint: String,
    api_token: Option<String>,
    http: reqwest::Client,
}

impl HttpCredentialSource {
    /// Create a source for the given endpoint and optional API token
    pub fn new(endpoint: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch_identities(&self) -> std::result::Result<Vec<Identity>, IdentityError> {
        let mut request = self.http.get(&self.endpoint);
        if let Some(token) = &self.api_token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Token {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| IdentityError::PoolUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::PoolUnavailable(format!(
                "credential service returned status {}",
                response.status()
            )));
        }

        let list: CredentialListResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::PoolUnavailable(format!("malformed proxy list: {e}")))?;

        Ok(list.results)
    }
}

/// A leased identity: the proxy tuple plus its pre-built HTTP client
///
/// Cheap to clone; the client shares its connection pool internally.
#[derive(Clone, Debug)]
pub struct IdentityLease {
    /// The identity backing this lease
    pub identity: Identity,
    /// HTTP client routed through the identity's proxy
    pub client: reqwest::Client,
}

/// Round-robin pool of outbound identities
///
/// The pool fetches its identity list exactly once, on the first successful
/// [`acquire`](Self::acquire); each identity gets a proxied `reqwest::Client`
/// built up front so leases are clone-and-go.
pub struct IdentityPool {
    source: Arc<dyn CredentialSource>,
    request_timeout: Duration,
    entries: OnceCell<Vec<IdentityLease>>,
    cursor: AtomicUsize,
}

impl IdentityPool {
    /// Create a pool backed by the given credential source
    ///
    /// `request_timeout` is baked into every proxied client the pool builds.
    pub fn new(source: Arc<dyn CredentialSource>, request_timeout: Duration) -> Self {
        Self {
            source,
            request_timeout,
            entries: OnceCell::new(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Acquire the next identity in rotation
    ///
    /// The first call populates the pool from the credential service; callers
    /// arriving while that fetch is in flight suspend until it settles. Fails
    /// with [`IdentityError::PoolUnavailable`] when the credential service
    /// call itself fails (propagated, not retried here) and with
    /// [`IdentityError::EmptyPool`] when the service answers with no proxies.
    pub async fn acquire(&self) -> Result<IdentityLease> {
        let entries = self
            .entries
            .get_or_try_init(|| self.populate())
            .await
            .map_err(crate::error::Error::Identity)?;

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % entries.len();
        Ok(entries[index].clone())
    }

    /// Number of identities in the pool, once populated
    pub fn size(&self) -> Option<usize> {
        self.entries.get().map(Vec::len)
    }

    async fn populate(&self) -> std::result::Result<Vec<IdentityLease>, IdentityError> {
        let identities = self.source.fetch_identities().await?;
        if identities.is_empty() {
            return Err(IdentityError::EmptyPool);
        }

        tracing::info!(count = identities.len(), "populated identity pool");

        identities
            .into_iter()
            .map(|identity| {
                let client = build_proxied_client(&identity, self.request_timeout)?;
                Ok(IdentityLease { identity, client })
            })
            .collect()
    }
}

impl std::fmt::Debug for IdentityPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityPool")
            .field("size", &self.size())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

fn build_proxied_client(
    identity: &Identity,
    timeout: Duration,
) -> std::result::Result<reqwest::Client, IdentityError> {
    let client_build = reqwest::Proxy::all(identity.proxy_url())
        .map(|proxy| proxy.basic_auth(&identity.username, &identity.password))
        .and_then(|proxy| {
            reqwest::Client::builder()
                .proxy(proxy)
                .timeout(timeout)
                .build()
        });

    client_build.map_err(|e| IdentityError::ClientBuild {
        address: identity.address.clone(),
        port: identity.port,
        reason: e.to_string(),
    })
}
