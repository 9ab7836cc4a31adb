//! Phase 2 — detail fetching with write-at-settlement streaming

use super::Harvester;
use crate::api::{merge_detail_record, parse_detail};
use crate::error::Result;
use crate::output::NdjsonWriter;
use crate::retry::fetch_with_retry;
use crate::types::{AgentId, Event};
use futures::StreamExt;
use futures::stream::FuturesUnordered;

impl Harvester {
    /// Fetch the detail document for every collected identifier
    ///
    /// Batching mirrors phase 1. Each successful record is appended to the
    /// sink at the moment its future settles, so records land in completion
    /// order within a batch. A failed item is logged and dropped — no
    /// placeholder line is written.
    pub(crate) async fn fetch_details(
        &self,
        ids: &[AgentId],
        writer: &mut NdjsonWriter,
        errors: &mut Vec<String>,
    ) -> Result<()> {
        let batch_count = ids.chunks(self.config.batch.batch_size).count();

        for (index, batch) in ids.chunks(self.config.batch.batch_size).enumerate() {
            let mut settled: FuturesUnordered<_> = batch
                .iter()
                .map(|id| async move { (id.clone(), self.fetch_detail(id).await) })
                .collect();

            while let Some((id, result)) = settled.next().await {
                match result {
                    Ok(record) => {
                        let written = writer.append(&record).await?;
                        self.emit(Event::RecordWritten { id, written });
                    }
                    Err(e) => {
                        errors.push(format!(
                            "detail fetch for agent {id} failed after {} attempts: {e}",
                            self.config.retry.max_attempts
                        ));
                        self.emit(Event::AgentFailed { id });
                    }
                }
            }

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.batch.inter_batch_delay).await;
            }
        }

        Ok(())
    }

    async fn fetch_detail(&self, id: &AgentId) -> Result<serde_json::Value> {
        let url = self.api.detail_url(id);
        let url_ref = &url;
        fetch_with_retry(&self.config.retry, || async move {
            let body = self.fetch_json(url_ref).await?;
            let data = parse_detail(url_ref, body)?;
            Ok(merge_detail_record(id, data))
        })
        .await
    }
}
