//! Phase 1 — identifier enumeration over the paginated listing endpoint

use super::Harvester;
use crate::api::{page_count, parse_listing};
use crate::error::{Error, Result};
use crate::retry::fetch_with_retry;
use crate::types::{AgentId, Event};
use futures::future::join_all;

/// What enumeration learned and collected
pub(crate) struct EnumerationOutcome {
    pub(crate) total_count: u64,
    pub(crate) page_count: u64,
    pub(crate) pages_failed: u64,
    pub(crate) ids: Vec<AgentId>,
}

impl Harvester {
    /// Collect every agent identifier the listing endpoint reports
    ///
    /// Page 0 is fetched directly (unbatched) to learn the total count; its
    /// failure, after the standard retry budget, is fatal to the run — there
    /// is no page count to proceed with. Remaining pages go through the batch
    /// loop; a page that exhausts its retries contributes zero identifiers
    /// and one error-log entry, and enumeration proceeds.
    pub(crate) async fn enumerate(&self, errors: &mut Vec<String>) -> Result<EnumerationOutcome> {
        let page_size = self.config.api.page_size;

        let first_url = self.api.listing_url(0, page_size);
        let url_ref = &first_url;
        let first_page = fetch_with_retry(&self.config.retry, || async move {
            let body = self.fetch_json(url_ref).await?;
            parse_listing(url_ref, body)
        })
        .await
        .map_err(|e| Error::Enumeration(format!("first listing page unavailable: {e}")))?;

        let total_count = first_page.total_agents;
        let pages = page_count(total_count, page_size);

        tracing::info!(total_count, pages, "listing size learned from page 0");
        self.emit(Event::EnumerationStarted {
            total_count,
            page_count: pages,
        });

        let mut ids: Vec<AgentId> = first_page.agents.into_iter().map(|a| a.id).collect();
        self.emit(Event::PageFetched {
            page: 0,
            agents: ids.len(),
        });

        let mut pages_failed = 0u64;
        let remaining: Vec<u64> = (1..pages).collect();
        let batch_count = remaining.chunks(self.config.batch.batch_size).count();

        for (index, batch) in remaining.chunks(self.config.batch.batch_size).enumerate() {
            // Launch the whole batch before awaiting any member; one bad page
            // must not abort enumeration.
            let results = join_all(batch.iter().map(|&page| self.fetch_page(page))).await;

            for (&page, result) in batch.iter().zip(results) {
                match result {
                    Ok(page_ids) => {
                        self.emit(Event::PageFetched {
                            page,
                            agents: page_ids.len(),
                        });
                        ids.extend(page_ids);
                    }
                    Err(e) => {
                        pages_failed += 1;
                        errors.push(format!(
                            "listing page {page} failed after {} attempts: {e}",
                            self.config.retry.max_attempts
                        ));
                        self.emit(Event::PageFailed { page });
                    }
                }
            }

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.batch.inter_batch_delay).await;
            }
        }

        Ok(EnumerationOutcome {
            total_count,
            page_count: pages,
            pages_failed,
            ids,
        })
    }

    async fn fetch_page(&self, page: u64) -> Result<Vec<AgentId>> {
        let url = self.api.listing_url(page, self.config.api.page_size);
        let url_ref = &url;
        let listing = fetch_with_retry(&self.config.retry, || async move {
            let body = self.fetch_json(url_ref).await?;
            parse_listing(url_ref, body)
        })
        .await?;
        Ok(listing.agents.into_iter().map(|a| a.id).collect())
    }
}
