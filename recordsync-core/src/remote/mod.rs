//! Remote record store abstraction and the batched write client.
//!
//! A [`RemoteStore`] performs one upsert call for a batch that already fits
//! the store's per-call limit. [`RemoteWriteClient`] is what the pipeline
//! talks to: it splits arbitrarily large inputs into chunks and reassembles
//! the per-record outcomes in input order.

pub mod salesforce;
pub mod writer;

pub use salesforce::SalesforceSession;
pub use writer::RemoteWriteClient;

use crate::error::RemoteError;
use crate::types::{CandidateRecord, UpsertOutcome};
use async_trait::async_trait;

/// One upsert call against the remote store.
///
/// Implementations must send the batch in partial-success mode: one invalid
/// record never rejects the rest. The returned outcomes are in the same
/// order as `records` and have the same length. `Err` means the call itself
/// failed (transport, auth, malformed response), not that records were
/// rejected.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upsert(
        &self,
        object_type: &str,
        external_id_field: &str,
        records: &[CandidateRecord],
    ) -> Result<Vec<UpsertOutcome>, RemoteError>;
}

/// An authenticated store session that must be released after use.
#[async_trait]
pub trait RemoteSession: RemoteStore {
    async fn logout(&self) -> Result<(), RemoteError>;
}
