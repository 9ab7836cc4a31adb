//! Core types for agent-harvest

use serde::{Deserialize, Serialize};

/// Opaque identifier of an agent record, discovered during enumeration
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    /// Create a new AgentId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event emitted during a harvest run
///
/// Consumers subscribe via [`Harvester::subscribe`](crate::harvester::Harvester::subscribe).
/// Events carry enough context to drive a progress display without polling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Enumeration learned the total record count from page 0
    EnumerationStarted {
        /// Total records reported by the listing endpoint
        total_count: u64,
        /// Derived page count (ceiling of total / page size)
        page_count: u64,
    },

    /// A listing page yielded its agent identifiers
    PageFetched {
        /// Zero-based page index
        page: u64,
        /// Number of identifiers collected from this page
        agents: usize,
    },

    /// A listing page failed permanently (retry budget exhausted)
    PageFailed {
        /// Zero-based page index
        page: u64,
    },

    /// A detail record was appended to the output stream
    RecordWritten {
        /// Identifier of the record
        id: AgentId,
        /// Records written so far, including this one
        written: u64,
    },

    /// A detail fetch failed permanently (retry budget exhausted)
    AgentFailed {
        /// Identifier of the failed record
        id: AgentId,
    },

    /// The run finished; counts match the returned [`RunSummary`]
    Completed {
        /// Identifiers discovered in phase 1
        agents_discovered: usize,
        /// Records written in phase 2
        records_written: u64,
        /// Total error-log entries accumulated
        errors: usize,
    },
}

/// Outcome of a harvest run
///
/// Returned by [`Harvester::run`](crate::harvester::Harvester::run). A run
/// with partial failures still completes and reports them here rather than
/// aborting; `records_written < agents_discovered` means some detail fetches
/// were skipped after exhausting their retry budget.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total records reported by the listing endpoint
    pub total_count: u64,
    /// Listing pages derived from the total
    pub page_count: u64,
    /// Listing pages that failed permanently
    pub pages_failed: u64,
    /// Agent identifiers collected in phase 1
    pub agents_discovered: usize,
    /// Detail records appended to the output stream in phase 2
    pub records_written: u64,
    /// Ordered failure descriptions accumulated over the run
    pub errors: Vec<String>,
}

impl RunSummary {
    /// True when every page and every detail fetch succeeded
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}
