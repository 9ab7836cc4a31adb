//! Rotating emulated-browser header sets
//!
//! Each outbound request gets a full header set synthesized from one of a
//! fixed roster of browser profiles, rotated round-robin. Chromium-family
//! profiles additionally carry the client-hint headers real Chromium sends;
//! caller-supplied headers always win on conflict.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Browser family a profile emulates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrowserFamily {
    /// Chromium-based (Chrome, Edge) — sends client-hint headers
    Chromium,
    /// Firefox
    Firefox,
    /// Safari
    Safari,
}

/// One emulated browser: a user-agent string plus its family
#[derive(Clone, Copy, Debug)]
pub struct BrowserProfile {
    /// Family, controls which conditional headers are attached
    pub family: BrowserFamily,
    /// Full User-Agent string
    pub user_agent: &'static str,
    /// Value for `sec-ch-ua-platform` (Chromium only)
    platform: &'static str,
}

/// Built-in rotation roster
const PROFILES: &[BrowserProfile] = &[
    BrowserProfile {
        family: BrowserFamily::Chromium,
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        platform: "\"Windows\"",
    },
    BrowserProfile {
        family: BrowserFamily::Chromium,
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        platform: "\"macOS\"",
    },
    BrowserProfile {
        family: BrowserFamily::Firefox,
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        platform: "",
    },
    BrowserProfile {
        family: BrowserFamily::Safari,
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        platform: "",
    },
    BrowserProfile {
        family: BrowserFamily::Chromium,
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
        platform: "\"Windows\"",
    },
];

/// Round-robin rotator over the built-in browser profiles
#[derive(Debug, Default)]
pub struct HeaderRotator {
    cursor: AtomicUsize,
}

impl HeaderRotator {
    /// Create a rotator starting at the first profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of profiles in the rotation roster
    pub fn profile_count(&self) -> usize {
        PROFILES.len()
    }

    /// Synthesize a full header set for the next profile in rotation
    ///
    /// Caller-supplied headers are merged last and win on conflict.
    pub fn next_headers(&self, extra: &HeaderMap) -> HeaderMap {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % PROFILES.len();
        let profile = &PROFILES[index];

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(profile.user_agent));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        if profile.family == BrowserFamily::Chromium {
            headers.insert(
                HeaderName::from_static("sec-ch-ua"),
                HeaderValue::from_static(
                    "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\"",
                ),
            );
            headers.insert(
                HeaderName::from_static("sec-ch-ua-mobile"),
                HeaderValue::from_static("?0"),
            );
            headers.insert(
                HeaderName::from_static("sec-ch-ua-platform"),
                HeaderValue::from_static(profile.platform),
            );
        }

        for (name, value) in extra {
            headers.insert(name.clone(), value.clone());
        }

        headers
    }
}
