//! Per-item retry with a flat delay
//!
//! Failed fetches are re-attempted up to a bounded budget with the same fixed
//! sleep between attempts — the delay does not grow and carries no jitter.
//! Classification of retryable vs permanent failures follows the
//! [`IsRetryable`] trait.
//!
//! # Example
//!
//! ```no_run
//! use agent_harvest::retry::fetch_with_retry;
//! use agent_harvest::config::RetryConfig;
//! use agent_harvest::error::Error;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let body = fetch_with_retry(&config, || async {
//!     // Your fetch here
//!     Ok::<String, Error>("body".to_string())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, FetchError};
use std::future::Future;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection resets, server overload)
/// should return `true`. Permanent failures (bad configuration, an
/// unavailable identity pool, malformed data) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Network errors are generally retryable
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            // Server-side trouble and throttling are worth another attempt
            Error::Fetch(FetchError::Status { status, .. }) => {
                *status >= 500 || *status == 429 || *status == 408
            }
            // A body with the wrong shape will have the wrong shape next time too
            Error::Fetch(FetchError::UnexpectedBody { .. }) => false,
            // No pool means no pool for the rest of the run
            Error::Identity(_) => false,
            // Cache errors never gate a fetch; housekeeping failures are permanent
            Error::Cache(_) => false,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Config errors are permanent
            Error::Config { .. } => false,
            // Serialization errors are permanent
            Error::Serialization(_) => false,
            // Enumeration failure is a run-level verdict, not a transient condition
            Error::Enumeration(_) => false,
            // Unknown errors - be conservative and don't retry
            Error::Other(_) => false,
        }
    }
}

/// Execute an async fetch with bounded, flat-delay retry
///
/// The operation is attempted at most `config.max_attempts` times in total;
/// every wait between attempts is exactly `config.delay`. Returns the first
/// success, or the last error once the budget is exhausted or a
/// non-retryable error appears.
pub async fn fetch_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "fetch succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = config.delay.as_millis(),
                    "fetch failed, retrying"
                );
                tokio::time::sleep(config.delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "fetch failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "fetch failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
