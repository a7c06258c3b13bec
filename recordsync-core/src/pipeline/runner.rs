//! Pipeline runner: executes steps in order, threading the identifier map
//! from producing steps to the steps after them.

use super::identifier_map::IdentifierMap;
use super::summary::{RunReport, StepSummary};
use super::types::{Pipeline, PipelineStep, RunStatus};
use crate::error::{PipelineError, SyncError};
use crate::remote::RemoteWriteClient;
use crate::types::Dataset;
use chrono::Utc;
use tracing::{debug, error, info};

/// Runs pipelines against a single write client.
///
/// Each call to [`PipelineRunner::run`] is an independent run; nothing is
/// carried over between runs.
pub struct PipelineRunner {
    writer: RemoteWriteClient,
}

struct StepResult {
    summary: StepSummary,
    published: Option<IdentifierMap>,
}

impl PipelineRunner {
    pub fn new(writer: RemoteWriteClient) -> Self {
        Self { writer }
    }

    /// Execute every step of `pipeline` over `dataset`.
    ///
    /// Record-level rejections are counted and the run continues. The first
    /// call-level error stops the run in [`RunStatus::Failed`]; records
    /// written by earlier steps stay written.
    pub async fn run(&self, pipeline: &Pipeline, dataset: Dataset) -> RunReport {
        let mut report = RunReport::new(pipeline.name());
        info!(
            run_id = %report.run_id,
            pipeline = %pipeline.name(),
            steps = pipeline.steps().len(),
            rows = dataset.len(),
            "Starting pipeline run"
        );

        let mut ids: Option<IdentifierMap> = None;
        for (index, step) in pipeline.steps().iter().enumerate() {
            advance(&mut report, RunStatus::Running { step_index: index });
            info!(step = %step.name, kind = %step.kind, target = %step.target, "Executing step");

            match self.execute_step(step, &dataset, ids.as_ref()).await {
                Ok(result) => {
                    if let Some(map) = result.published {
                        ids = Some(map);
                    }
                    report.steps.push(result.summary);
                }
                Err(source) => {
                    let err = PipelineError::StepFailed {
                        step: step.name.clone(),
                        source: Box::new(source),
                    };
                    error!(run_id = %report.run_id, "{err}");
                    report.failed_step = Some(step.name.clone());
                    report.error = Some(err.to_string());
                    advance(&mut report, RunStatus::Failed);
                    return report;
                }
            }
        }

        advance(&mut report, RunStatus::Completed);
        report
    }

    async fn execute_step(
        &self,
        step: &PipelineStep,
        dataset: &Dataset,
        current: Option<&IdentifierMap>,
    ) -> Result<StepResult, SyncError> {
        let ids = if step.kind.consumes_identifier_map() {
            let map = current.ok_or_else(|| PipelineError::MissingIdentifierMap {
                step: step.name.clone(),
            })?;
            Some(map)
        } else {
            None
        };

        let records = step.transformer().transform(dataset, ids)?;
        debug!(step = %step.name, records = records.len(), "Transform complete");

        let outcomes = self.writer.write(&step.target, &records).await?;
        if outcomes.len() != records.len() {
            return Err(PipelineError::OutcomeMismatch {
                step: step.name.clone(),
                records: records.len(),
                outcomes: outcomes.len(),
            }
            .into());
        }

        let mut summary = StepSummary::from_outcomes(
            &step.name,
            step.kind,
            &step.target.object_type,
            &step.target.external_id_field,
            &records,
            &outcomes,
        );

        let published = if step.kind.produces_identifier_map() {
            let map = IdentifierMap::from_outcomes(
                &step.name,
                &step.target.external_id_field,
                &records,
                &outcomes,
            )?;
            info!(
                step = %step.name,
                "Step created an ID map with {} entries",
                map.len()
            );
            summary.identifier_map_entries = Some(map.len());
            Some(map)
        } else {
            None
        };

        Ok(StepResult { summary, published })
    }
}

/// Move the run forward. Terminal states also stamp the finish time.
fn advance(report: &mut RunReport, next: RunStatus) {
    debug_assert!(
        is_forward(report.status, next),
        "illegal run transition {} -> {}",
        report.status,
        next
    );
    debug!(run_id = %report.run_id, from = %report.status, to = %next, "Run state change");
    report.status = next;
    if next.is_terminal() {
        report.finished_at = Some(Utc::now());
    }
}

fn is_forward(from: RunStatus, to: RunStatus) -> bool {
    match (from, to) {
        (RunStatus::Idle, RunStatus::Running { step_index }) => step_index == 0,
        (RunStatus::Idle, RunStatus::Completed) => true,
        (RunStatus::Running { step_index: a }, RunStatus::Running { step_index: b }) => b == a + 1,
        (RunStatus::Running { .. }, RunStatus::Completed | RunStatus::Failed) => true,
        _ => false,
    }
}
