//! Chunked upsert client.

use super::RemoteStore;
use crate::config::WriteConfig;
use crate::error::{ConfigError, RemoteError};
use crate::types::{CandidateRecord, UpsertOutcome, WriteTarget};
use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Writes any number of records to a [`RemoteStore`] in bounded chunks.
///
/// Outcomes come back in input order regardless of how many chunks are in
/// flight. A call-level failure of any chunk fails the whole write; outcomes
/// of chunks that already completed are discarded with it.
#[derive(Clone)]
pub struct RemoteWriteClient {
    store: Arc<dyn RemoteStore>,
    config: WriteConfig,
}

impl RemoteWriteClient {
    pub fn new(store: Arc<dyn RemoteStore>, config: WriteConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &WriteConfig {
        &self.config
    }

    /// Upsert `records` into `target`, matching on its external id field.
    ///
    /// An empty input returns an empty result without calling the store.
    pub async fn write(
        &self,
        target: &WriteTarget,
        records: &[CandidateRecord],
    ) -> Result<Vec<UpsertOutcome>, RemoteError> {
        info!(
            object = %target.object_type,
            records = records.len(),
            "Upserting records"
        );
        if records.is_empty() {
            info!(object = %target.object_type, "No records to upsert; skipping");
            return Ok(Vec::new());
        }

        let chunks: Vec<Vec<UpsertOutcome>> =
            stream::iter(records.chunks(self.config.batch_size).enumerate())
                .map(|(index, chunk)| self.write_chunk(target, index, chunk))
                .buffered(self.config.max_concurrent_chunks)
                .try_collect()
                .await?;
        let outcomes: Vec<UpsertOutcome> = chunks.into_iter().flatten().collect();

        log_results(&target.object_type, &outcomes);
        Ok(outcomes)
    }

    async fn write_chunk(
        &self,
        target: &WriteTarget,
        index: usize,
        chunk: &[CandidateRecord],
    ) -> Result<Vec<UpsertOutcome>, RemoteError> {
        debug!(
            object = %target.object_type,
            chunk = index,
            size = chunk.len(),
            "Processing batch"
        );
        let call = self
            .store
            .upsert(&target.object_type, &target.external_id_field, chunk);
        let outcomes = tokio::time::timeout(self.config.call_timeout(), call)
            .await
            .map_err(|_| RemoteError::Timeout {
                object: target.object_type.clone(),
                timeout_secs: self.config.call_timeout_secs,
            })??;

        if outcomes.len() != chunk.len() {
            return Err(RemoteError::MalformedResponse {
                object: target.object_type.clone(),
                message: format!(
                    "batch {index} returned {} outcomes for {} records",
                    outcomes.len(),
                    chunk.len()
                ),
            });
        }
        Ok(outcomes)
    }
}

fn log_results(object: &str, outcomes: &[UpsertOutcome]) {
    let successes = outcomes.iter().filter(|o| o.success).count();
    let failures = outcomes.len() - successes;
    info!(
        object,
        successes, failures, "Results for {object}: {successes} successes, {failures} failures"
    );
    if let Some(first) = outcomes.iter().find(|o| !o.success) {
        let details = serde_json::to_string(&first.errors).unwrap_or_default();
        warn!(object, "First failure details: {details}");
    }
}
