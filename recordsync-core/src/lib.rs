//! # Recordsync Core
//!
//! Pipeline engine for syncing report exports into Salesforce.
//! Provides dataset extraction, per-report transformers, the batched upsert
//! client, the cross-step identifier map, and the pipeline runner.

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod remote;
pub mod reports;
pub mod sync;
pub mod transform;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{SyncConfig, WriteConfig, load_config};
pub use error::{Result, SyncError};
pub use extract::{CsvExtractor, DataExtractor};
pub use pipeline::{
    IdentifierMap, Pipeline, PipelineRunner, PipelineStep, RunReport, RunStatus, StepKind,
    StepSummary,
};
pub use remote::{RemoteSession, RemoteStore, RemoteWriteClient, SalesforceSession};
pub use reports::{ReportDefinition, get_report, list_report_names};
pub use sync::run_with_session;
pub use transform::{Transformer, from_fn};
pub use types::{CandidateRecord, CellValue, Dataset, Row, UpsertOutcome, WriteTarget};
