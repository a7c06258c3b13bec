//! Built-in report definitions.
//!
//! A report names where its exports live, how many preamble rows each file
//! carries, and the pipeline that syncs it. Every built-in pipeline first
//! upserts people as `Contact` records (publishing the identifier map) and
//! then writes a report-specific object linked to those contacts.

pub mod gnrl106;
pub mod gnrl220;

use crate::error::{ConfigError, SyncError};
use crate::pipeline::{Pipeline, PipelineStep, StepKind};
use crate::transform::Transformer;
use crate::types::WriteTarget;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CONTACT_OBJECT: &str = "Contact";
pub const CONTACT_EXTERNAL_ID: &str = "ONE_Systems_ID__c";

const REPORT_NAMES: &[&str] = &["gnrl106", "gnrl220", "gnrl220-test"];

/// Everything needed to run one report.
#[derive(Debug, Clone)]
pub struct ReportDefinition {
    /// Registry key, e.g. `gnrl106`.
    pub name: String,
    /// Display id, e.g. `GNRL-106`.
    pub report_id: String,
    pub source_dir: PathBuf,
    pub rows_to_skip: usize,
    pub pipeline: Pipeline,
}

pub fn list_report_names() -> &'static [&'static str] {
    REPORT_NAMES
}

/// Resolve a built-in report. Source folders are `<data_dir>/<name>`.
pub fn get_report(name: &str, data_dir: &Path) -> Result<ReportDefinition, SyncError> {
    let (report_id, rows_to_skip, pipeline) = match name {
        "gnrl106" => ("GNRL-106", 11, gnrl106::pipeline()?),
        "gnrl220" => ("GNRL-220", 1, gnrl220::pipeline()?),
        "gnrl220-test" => ("GNRL-220-TEST", 1, gnrl220::pipeline()?),
        other => {
            return Err(ConfigError::UnknownReport {
                name: other.to_string(),
            }
            .into());
        }
    };

    Ok(ReportDefinition {
        name: name.to_string(),
        report_id: report_id.to_string(),
        source_dir: data_dir.join(name),
        rows_to_skip,
        pipeline,
    })
}

fn contacts_step(transformer: Arc<dyn Transformer>) -> PipelineStep {
    PipelineStep::new(
        "syncContacts",
        WriteTarget::new(CONTACT_OBJECT, CONTACT_EXTERNAL_ID),
        StepKind::Producing,
        transformer,
    )
}
