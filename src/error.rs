//! Error types for agent-harvest
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Identity, Cache, Fetch)
//! - Conversions from the underlying I/O, HTTP, and serialization errors
//! - Context information (URL, status code, configuration key)

use thiserror::Error;

/// Result type alias for agent-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for agent-harvest
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch.batch_size")
        key: Option<String>,
    },

    /// Identity pool error (credential service failure, empty pool)
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Response cache error
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Fetch-level error (bad status, unexpected body)
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Network error (connection, TLS, timeout)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Enumeration could not be started (first listing page unavailable)
    #[error("enumeration failed: {0}")]
    Enumeration(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Identity pool and credential service errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The credential service call failed, leaving no pool to serve identities
    #[error("identity pool unavailable: {0}")]
    PoolUnavailable(String),

    /// The credential service answered with an empty proxy list
    #[error("credential service returned an empty identity list")]
    EmptyPool,

    /// A proxied HTTP client could not be constructed for an identity
    #[error("failed to build proxied client for {address}:{port}: {reason}")]
    ClientBuild {
        /// Proxy address of the identity
        address: String,
        /// Proxy port of the identity
        port: u16,
        /// Why the client could not be built
        reason: String,
    },
}

/// Response cache errors
///
/// These never escape [`ResponseCache::get`](crate::cache::ResponseCache::get) —
/// corruption and expiry collapse to a cache miss there. They surface only from
/// setup and housekeeping operations like `purge_expired`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache directory could not be created or read
    #[error("cache directory {path} unusable: {reason}")]
    Directory {
        /// The cache directory path
        path: String,
        /// Why it is unusable
        reason: String,
    },

    /// A cache entry could not be written
    #[error("failed to write cache entry {key}: {reason}")]
    WriteFailed {
        /// Fingerprint of the entry
        key: String,
        /// Why the write failed
        reason: String,
    },
}

/// Fetch-level errors for a single request attempt
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status code
    #[error("request to {url} returned status {status}")]
    Status {
        /// The requested URL
        url: String,
        /// The HTTP status code received
        status: u16,
    },

    /// The response body did not have the expected shape
    #[error("unexpected response body from {url}: {reason}")]
    UnexpectedBody {
        /// The requested URL
        url: String,
        /// What was wrong with the body
        reason: String,
    },
}
