//! Remote directory API surface
//!
//! URL templates for the listing and detail endpoints plus the serde shapes
//! of their responses. The listing endpoint answers
//! `{"data": {"totalAgents": N, "agent": [...]}}`; the detail endpoint
//! answers `{"data": {...fields}}`, which gets merged with the identifier
//! into the final output record.

use crate::config::ApiConfig;
use crate::error::{FetchError, Result};
use crate::types::AgentId;
use serde::Deserialize;
use serde_json::Value;

/// URL construction for the listing and detail endpoints
#[derive(Clone, Debug)]
pub struct DirectoryApi {
    listing_template: String,
    detail_template: String,
}

impl DirectoryApi {
    /// Build the API surface from configuration
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            listing_template: config.listing_url.clone(),
            detail_template: config.detail_url.clone(),
        }
    }

    /// Listing URL for a zero-based page index
    pub fn listing_url(&self, page: u64, page_size: u64) -> String {
        self.listing_template
            .replace("{page}", &page.to_string())
            .replace("{page_size}", &page_size.to_string())
    }

    /// Detail URL for one agent identifier
    ///
    /// The identifier is percent-encoded before substitution; ids are opaque
    /// and may contain characters with URL meaning.
    pub fn detail_url(&self, id: &AgentId) -> String {
        self.detail_template
            .replace("{id}", &urlencoding::encode(id.as_str()))
    }
}

/// Listing endpoint payload: total count plus this page's agents
#[derive(Debug, Deserialize)]
pub struct ListingData {
    /// Total agent count across all pages
    #[serde(rename = "totalAgents")]
    pub total_agents: u64,
    /// Agents on this page
    #[serde(default, rename = "agent")]
    pub agents: Vec<AgentSummary>,
}

/// One agent entry in a listing page
#[derive(Debug, Deserialize)]
pub struct AgentSummary {
    /// Opaque identifier used to fetch the detail document
    pub id: AgentId,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    data: serde_json::Map<String, Value>,
}

/// Interpret a fetched body as a listing page
pub fn parse_listing(url: &str, body: Value) -> Result<ListingData> {
    let response: ListingResponse =
        serde_json::from_value(body).map_err(|e| FetchError::UnexpectedBody {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(response.data)
}

/// Interpret a fetched body as a detail document
pub fn parse_detail(url: &str, body: Value) -> Result<serde_json::Map<String, Value>> {
    let response: DetailResponse =
        serde_json::from_value(body).map_err(|e| FetchError::UnexpectedBody {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(response.data)
}

/// Merge a detail document with its identifier into one output record
///
/// The identifier wins over any `id` field the detail document carries.
pub fn merge_detail_record(id: &AgentId, mut data: serde_json::Map<String, Value>) -> Value {
    data.insert("id".to_string(), Value::String(id.as_str().to_string()));
    Value::Object(data)
}

/// Number of listing pages needed for `total` records at `page_size` per page
pub fn page_count(total: u64, page_size: u64) -> u64 {
    total.div_ceil(page_size)
}
