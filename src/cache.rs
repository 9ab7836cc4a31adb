//! Persistent response cache
//!
//! One file per cache key on durable storage. Each entry carries its body
//! tagged with its shape (plain text vs structured JSON) and an expiry
//! timestamp, so a read restores the original shape without caller-supplied
//! type hints.
//!
//! Corruption handling is deliberately minimal: an unparseable entry is
//! deleted and reported as a miss. Nothing beyond deleting the single bad
//! file is attempted.

use crate::error::{CacheError, Result};
use chrono::Utc;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Header names that participate in the request fingerprint
///
/// Cache keys must stay session-aware (the same URL fetched under a different
/// session cookie is a different resource) while ignoring volatile headers
/// like the rotated User-Agent.
const SESSION_HEADERS: &[&str] = &["cookie", "x-session-id"];

/// A cached response body, tagged with its shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CacheValue {
    /// Plain text body
    Text(String),
    /// Structured JSON body
    Json(serde_json::Value),
}

impl CacheValue {
    /// Borrow the structured body, if this value is JSON
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            CacheValue::Json(value) => Some(value),
            CacheValue::Text(_) => None,
        }
    }
}

/// On-disk entry format: the shape-tagged value plus its expiry
///
/// `expires_at` is unix seconds; `0` means no expiry is tracked for the
/// entry (such entries are never purged).
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    #[serde(flatten)]
    value: CacheValue,
    expires_at: i64,
}

/// Compute the fingerprint for a request
///
/// Deterministic across process runs: SHA-256 over the URL plus the
/// session-relevant subset of headers, folded in canonical order (lowercased
/// name, sorted) so header order and unrelated headers cannot perturb the key.
pub fn fingerprint(url: &str, headers: &HeaderMap) -> String {
    let mut session: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| SESSION_HEADERS.contains(&name.as_str()))
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    session.sort();

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    for (name, value) in &session {
        hasher.update(b"\n");
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(value.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Persistent key-value store for fetched response bodies
///
/// Keys are request fingerprints (see [`fingerprint`]); values are
/// shape-tagged bodies with per-entry expiration. All operations are
/// best-effort with respect to corruption: a bad entry is treated as absent.
#[derive(Clone, Debug)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Open a cache rooted at `dir`, creating the directory if absent
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::Directory {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { dir })
    }

    /// Look up a live entry by fingerprint
    ///
    /// Returns `None` for missing, malformed, or expired entries. Malformed
    /// and expired entries are deleted as a side effect. Never raises —
    /// corruption and expiry both collapse to a miss.
    pub async fn get(&self, key: &str) -> Option<CacheValue> {
        let path = self.entry_path(key);
        let raw = tokio::fs::read(&path).await.ok()?;

        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "deleting malformed cache entry");
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };

        if entry.expires_at != 0 && entry.expires_at <= Utc::now().timestamp() {
            tracing::debug!(key, "evicting expired cache entry");
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }

        Some(entry.value)
    }

    /// Persist a value under `key` with the given time-to-live
    ///
    /// A non-positive TTL makes this a no-op: nothing is written and any
    /// existing entry is left untouched. Callers must not assume zero-TTL
    /// writes persist.
    pub async fn set(&self, key: &str, value: CacheValue, ttl: std::time::Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }

        let entry = CacheEntry {
            value,
            expires_at: Utc::now().timestamp() + ttl.as_secs() as i64,
        };
        let body = serde_json::to_vec(&entry)?;
        tokio::fs::write(self.entry_path(key), body)
            .await
            .map_err(|e| CacheError::WriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Delete the entry for `key`, reporting whether it was present
    pub async fn delete(&self, key: &str) -> bool {
        tokio::fs::remove_file(self.entry_path(key)).await.is_ok()
    }

    /// Sweep the cache directory, deleting every expired entry
    ///
    /// Entries with a zero expiry are never purged. Unparseable files are
    /// deleted the same way [`get`](Self::get) would delete them. Returns the
    /// number of files removed. Intended for out-of-band housekeeping; `get`
    /// already evicts the single entry it touches.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now().timestamp();
        let mut removed = 0;

        let mut entries =
            tokio::fs::read_dir(&self.dir)
                .await
                .map_err(|e| CacheError::Directory {
                    path: self.dir.display().to_string(),
                    reason: e.to_string(),
                })?;

        while let Ok(Some(dir_entry)) = entries.next_entry().await {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let expired = match tokio::fs::read(&path).await {
                Ok(raw) => match serde_json::from_slice::<CacheEntry>(&raw) {
                    Ok(entry) => entry.expires_at != 0 && entry.expires_at <= now,
                    // Corrupt file: same treatment as a corrupt read
                    Err(_) => true,
                },
                Err(_) => false,
            };
            if expired && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// The directory this cache stores its entries in
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, COOKIE, USER_AGENT};
    use std::time::Duration;
    use tempfile::tempdir;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[tokio::test]
    async fn round_trips_text_and_json_values() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).await.unwrap();

        cache
            .set("text-key", CacheValue::Text("hello".to_string()), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set(
                "json-key",
                CacheValue::Json(serde_json::json!({"data": {"totalAgents": 3}})),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        assert_eq!(
            cache.get("text-key").await,
            Some(CacheValue::Text("hello".to_string()))
        );
        let json = cache.get("json-key").await.unwrap();
        assert_eq!(
            json.as_json().unwrap()["data"]["totalAgents"],
            serde_json::json!(3)
        );
    }

    #[tokio::test]
    async fn zero_ttl_set_is_a_no_op() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).await.unwrap();

        cache
            .set("key", CacheValue::Text("v".to_string()), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(cache.get("key").await, None);
        assert!(
            !dir.path().join("key.json").exists(),
            "zero-ttl set must not create a file"
        );
    }

    #[tokio::test]
    async fn zero_ttl_set_leaves_existing_entry_untouched() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).await.unwrap();

        cache
            .set("key", CacheValue::Text("old".to_string()), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("key", CacheValue::Text("new".to_string()), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(
            cache.get("key").await,
            Some(CacheValue::Text("old".to_string()))
        );
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent_and_is_removed() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).await.unwrap();

        // Write an already-expired entry directly in the on-disk format
        let expired = serde_json::json!({
            "kind": "text",
            "payload": "stale",
            "expires_at": Utc::now().timestamp() - 10,
        });
        std::fs::write(
            dir.path().join("stale-key.json"),
            serde_json::to_vec(&expired).unwrap(),
        )
        .unwrap();

        assert_eq!(cache.get("stale-key").await, None);
        assert!(
            !dir.path().join("stale-key.json").exists(),
            "expired entry should be evicted on read"
        );
    }

    #[tokio::test]
    async fn malformed_entry_reads_as_absent_and_is_removed() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).await.unwrap();

        std::fs::write(dir.path().join("bad-key.json"), b"not json at all").unwrap();

        assert_eq!(cache.get("bad-key").await, None);
        assert!(!dir.path().join("bad-key.json").exists());
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).await.unwrap();

        cache
            .set("key", CacheValue::Text("v".to_string()), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.delete("key").await);
        assert!(!cache.delete("key").await, "second delete should miss");
    }

    #[tokio::test]
    async fn purge_removes_only_expired_entries() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).await.unwrap();

        cache
            .set("live", CacheValue::Text("v".to_string()), Duration::from_secs(600))
            .await
            .unwrap();
        let expired = serde_json::json!({
            "kind": "text",
            "payload": "stale",
            "expires_at": Utc::now().timestamp() - 10,
        });
        std::fs::write(
            dir.path().join("stale.json"),
            serde_json::to_vec(&expired).unwrap(),
        )
        .unwrap();
        // Zero expiry means "no expiry tracked" and must survive the sweep
        let untracked = serde_json::json!({
            "kind": "text",
            "payload": "keep",
            "expires_at": 0,
        });
        std::fs::write(
            dir.path().join("untracked.json"),
            serde_json::to_vec(&untracked).unwrap(),
        )
        .unwrap();

        let removed = cache.purge_expired().await.unwrap();

        assert_eq!(removed, 1);
        assert!(dir.path().join("live.json").exists());
        assert!(dir.path().join("untracked.json").exists());
        assert!(!dir.path().join("stale.json").exists());
    }

    #[test]
    fn fingerprint_is_stable_for_identical_inputs() {
        let a = fingerprint("https://example.com/x", &headers_with_cookie("session=a"));
        let b = fingerprint("https://example.com/x", &headers_with_cookie("session=a"));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_on_session_cookie() {
        let a = fingerprint("https://example.com/x", &headers_with_cookie("session=a"));
        let b = fingerprint("https://example.com/x", &headers_with_cookie("session=b"));
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_ignores_unrelated_headers() {
        let mut with_ua = headers_with_cookie("session=a");
        with_ua.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0 rotated"));
        let a = fingerprint("https://example.com/x", &headers_with_cookie("session=a"));
        let b = fingerprint("https://example.com/x", &with_ua);
        assert_eq!(a, b, "rotated user-agent must not perturb the key");
    }

    #[test]
    fn fingerprint_differs_on_url() {
        let headers = HeaderMap::new();
        let a = fingerprint("https://example.com/x", &headers);
        let b = fingerprint("https://example.com/y", &headers);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_ignores_header_insertion_order() {
        let mut first = HeaderMap::new();
        first.insert(COOKIE, HeaderValue::from_static("session=a"));
        first.insert("x-session-id", HeaderValue::from_static("s-1"));

        let mut second = HeaderMap::new();
        second.insert("x-session-id", HeaderValue::from_static("s-1"));
        second.insert(COOKIE, HeaderValue::from_static("session=a"));

        assert_eq!(
            fingerprint("https://example.com/x", &first),
            fingerprint("https://example.com/x", &second)
        );
    }
}
