//! Pipeline orchestration: step definitions, the identifier map, the runner,
//! and run reporting.

pub mod identifier_map;
pub mod runner;
pub mod summary;
pub mod types;

pub use identifier_map::IdentifierMap;
pub use runner::PipelineRunner;
pub use summary::{FailureDetail, RunReport, StepSummary};
pub use types::{Pipeline, PipelineStep, RunStatus, StepKind};
