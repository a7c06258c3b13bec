//! Transformers turn an extracted dataset into candidate records for one
//! remote object.

pub mod coerce;

use crate::error::TransformError;
use crate::pipeline::IdentifierMap;
use crate::types::{CandidateRecord, Dataset};
use std::sync::Arc;

/// Converts rows into records. Consuming steps receive the identifier map
/// published by the most recent producing step; other steps receive `None`.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    fn transform(
        &self,
        dataset: &Dataset,
        ids: Option<&IdentifierMap>,
    ) -> Result<Vec<CandidateRecord>, TransformError>;
}

/// Adapts a closure into a [`Transformer`].
pub struct FnTransformer<F> {
    name: String,
    f: F,
}

impl<F> Transformer for FnTransformer<F>
where
    F: Fn(&Dataset, Option<&IdentifierMap>) -> Result<Vec<CandidateRecord>, TransformError>
        + Send
        + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(
        &self,
        dataset: &Dataset,
        ids: Option<&IdentifierMap>,
    ) -> Result<Vec<CandidateRecord>, TransformError> {
        (self.f)(dataset, ids)
    }
}

pub fn from_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Transformer>
where
    F: Fn(&Dataset, Option<&IdentifierMap>) -> Result<Vec<CandidateRecord>, TransformError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnTransformer {
        name: name.into(),
        f,
    })
}

/// Fetch the identifier map or fail with a transformer-scoped error.
pub fn require_ids<'a>(
    transformer: &str,
    ids: Option<&'a IdentifierMap>,
) -> Result<&'a IdentifierMap, TransformError> {
    ids.ok_or_else(|| TransformError::MissingIdentifierMap {
        transformer: transformer.to_string(),
    })
}
