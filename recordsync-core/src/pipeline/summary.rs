//! Per-step and per-run reporting.

use super::types::{RunStatus, StepKind};
use crate::types::{CandidateRecord, RecordError, UpsertOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The first rejected record of a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDetail {
    /// Position in the step's submitted records.
    pub index: usize,
    pub external_id: Option<String>,
    pub errors: Vec<RecordError>,
}

/// Outcome counts for one executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub step: String,
    pub kind: StepKind,
    pub object_type: String,
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successful outcomes the store flagged as newly created.
    pub created: usize,
    pub first_failure: Option<FailureDetail>,
    /// Size of the map this step published, for producing steps.
    pub identifier_map_entries: Option<usize>,
}

impl StepSummary {
    pub fn from_outcomes(
        step: &str,
        kind: StepKind,
        object_type: &str,
        external_id_field: &str,
        records: &[CandidateRecord],
        outcomes: &[UpsertOutcome],
    ) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let created = outcomes
            .iter()
            .filter(|o| o.success && o.created == Some(true))
            .count();
        let first_failure = outcomes
            .iter()
            .position(|o| !o.success)
            .map(|index| FailureDetail {
                index,
                external_id: records
                    .get(index)
                    .and_then(|r| r.external_id(external_id_field)),
                errors: outcomes[index].errors.clone(),
            });

        Self {
            step: step.to_string(),
            kind,
            object_type: object_type.to_string(),
            submitted: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            created,
            first_failure,
            identifier_map_entries: None,
        }
    }
}

/// Final state of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub status: RunStatus,
    /// Summaries of steps that finished their write, in execution order.
    pub steps: Vec<StepSummary>,
    pub failed_step: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            status: RunStatus::Idle,
            steps: Vec::new(),
            failed_step: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn total_submitted(&self) -> usize {
        self.steps.iter().map(|s| s.submitted).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.steps.iter().map(|s| s.failed).sum()
    }

    /// Human-readable multi-line summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Pipeline '{}' {}", self.pipeline, self.status);
        for step in &self.steps {
            let _ = writeln!(
                out,
                "  {} -> {}: {} submitted, {} succeeded, {} failed",
                step.step, step.object_type, step.submitted, step.succeeded, step.failed
            );
            if let Some(entries) = step.identifier_map_entries {
                let _ = writeln!(out, "    identifier map: {entries} entries");
            }
            if let Some(failure) = &step.first_failure {
                let reasons: Vec<String> = failure.errors.iter().map(|e| e.to_string()).collect();
                let _ = writeln!(
                    out,
                    "    first failure (record {}): {}",
                    failure.index,
                    reasons.join("; ")
                );
            }
        }
        if let Some(error) = &self.error {
            let _ = writeln!(out, "  aborted: {error}");
        }
        out
    }

    /// Emit the final state through tracing.
    pub fn log(&self) {
        match self.status {
            RunStatus::Completed => info!(
                run_id = %self.run_id,
                pipeline = %self.pipeline,
                submitted = self.total_submitted(),
                failed = self.total_failed(),
                "Pipeline '{}' processed successfully", self.pipeline
            ),
            RunStatus::Failed => error!(
                run_id = %self.run_id,
                pipeline = %self.pipeline,
                step = self.failed_step.as_deref().unwrap_or_default(),
                error = self.error.as_deref().unwrap_or_default(),
                "Pipeline '{}' failed", self.pipeline
            ),
            status => warn!(run_id = %self.run_id, %status, "Pipeline report is not final"),
        }
    }
}
