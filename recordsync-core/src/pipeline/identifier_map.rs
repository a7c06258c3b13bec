//! Run-scoped map from a source system's unique key to the remote record id.

use crate::error::PipelineError;
use crate::types::{CandidateRecord, UpsertOutcome};
use std::collections::HashMap;
use tracing::warn;

/// Immutable once built; the runner replaces it wholesale after each
/// producing step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMap {
    entries: HashMap<String, String>,
}

impl IdentifierMap {
    /// Pair `records` with `outcomes` by position and keep each successful
    /// record's `external_id_field` value -> remote id.
    ///
    /// Failed records are omitted. When a key repeats, the later successful
    /// record wins. Slices of different lengths are rejected with
    /// [`PipelineError::OutcomeMismatch`] naming `step`.
    pub fn from_outcomes(
        step: &str,
        external_id_field: &str,
        records: &[CandidateRecord],
        outcomes: &[UpsertOutcome],
    ) -> Result<Self, PipelineError> {
        if records.len() != outcomes.len() {
            return Err(PipelineError::OutcomeMismatch {
                step: step.to_string(),
                records: records.len(),
                outcomes: outcomes.len(),
            });
        }
        let mut entries = HashMap::with_capacity(records.len());

        for (index, (record, outcome)) in records.iter().zip(outcomes).enumerate() {
            if !outcome.success {
                continue;
            }
            let Some(remote_id) = outcome.id.as_ref() else {
                warn!(index, "Successful upsert returned no record id; not mapped");
                continue;
            };
            match record.external_id(external_id_field) {
                Some(key) => {
                    entries.insert(key, remote_id.clone());
                }
                None => warn!(
                    index,
                    field = external_id_field,
                    "Record has no external id value; not mapped"
                ),
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IdentifierMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
