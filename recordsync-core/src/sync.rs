//! Session-scoped pipeline execution.

use crate::config::WriteConfig;
use crate::error::SyncError;
use crate::pipeline::{Pipeline, PipelineRunner, RunReport};
use crate::remote::{RemoteSession, RemoteWriteClient};
use crate::types::Dataset;
use std::sync::Arc;
use tracing::warn;

/// Run `pipeline` against an authenticated session and release the session
/// afterwards, whatever the run's outcome.
///
/// A failed run is reported through [`RunReport::status`], not as `Err`.
/// `Err` is returned only when the write settings are invalid; the session
/// is still released in that case. Logout failures are logged and ignored.
pub async fn run_with_session<S>(
    session: Arc<S>,
    pipeline: &Pipeline,
    dataset: Dataset,
    write: &WriteConfig,
) -> Result<RunReport, SyncError>
where
    S: RemoteSession + 'static,
{
    let result = match RemoteWriteClient::new(session.clone(), write.clone()) {
        Ok(writer) => Ok(PipelineRunner::new(writer).run(pipeline, dataset).await),
        Err(e) => Err(SyncError::from(e)),
    };

    if let Err(e) = session.logout().await {
        warn!("Failed to log out: {e}");
    }
    result
}
