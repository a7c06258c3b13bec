//! Pipeline type definitions: steps, step kinds, validated pipelines, and run status.

use crate::error::PipelineError;
use crate::transform::Transformer;
use crate::types::WriteTarget;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// How a step interacts with the run's identifier map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Neither reads nor publishes a map.
    Plain,
    /// Publishes a new map from its successful writes.
    Producing,
    /// Reads the current map.
    Consuming,
    /// Reads the current map and then publishes a replacement.
    Relay,
}

impl StepKind {
    pub fn consumes_identifier_map(self) -> bool {
        matches!(self, StepKind::Consuming | StepKind::Relay)
    }

    pub fn produces_identifier_map(self) -> bool {
        matches!(self, StepKind::Producing | StepKind::Relay)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Plain => write!(f, "plain"),
            StepKind::Producing => write!(f, "producing"),
            StepKind::Consuming => write!(f, "consuming"),
            StepKind::Relay => write!(f, "relay"),
        }
    }
}

/// One transform-then-write unit of a pipeline.
#[derive(Clone)]
pub struct PipelineStep {
    pub name: String,
    pub target: WriteTarget,
    pub kind: StepKind,
    transformer: Arc<dyn Transformer>,
}

impl PipelineStep {
    pub fn new(
        name: impl Into<String>,
        target: WriteTarget,
        kind: StepKind,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            kind,
            transformer,
        }
    }

    pub fn transformer(&self) -> &dyn Transformer {
        self.transformer.as_ref()
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStep")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("transformer", &self.transformer.name())
            .finish()
    }
}

/// An ordered, validated list of steps.
///
/// Construction checks:
/// - At least one step exists
/// - Step names are non-empty and unique
/// - Every target names an object and an external id field
/// - No step consumes an identifier map before some earlier step produces one
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<PipelineStep>) -> Result<Self, PipelineError> {
        let name = name.into();
        validate_steps(&steps)?;
        Ok(Self { name, steps })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }
}

fn validate_steps(steps: &[PipelineStep]) -> Result<(), PipelineError> {
    if steps.is_empty() {
        return Err(PipelineError::ValidationFailed {
            message: "Pipeline must have at least one step".to_string(),
        });
    }

    let mut seen = HashSet::new();
    let mut map_published = false;
    for step in steps {
        if step.name.trim().is_empty() {
            return Err(PipelineError::ValidationFailed {
                message: "Step names must not be empty".to_string(),
            });
        }
        if !seen.insert(step.name.as_str()) {
            return Err(PipelineError::ValidationFailed {
                message: format!("Duplicate step name: '{}'", step.name),
            });
        }
        if step.target.object_type.trim().is_empty()
            || step.target.external_id_field.trim().is_empty()
        {
            return Err(PipelineError::ValidationFailed {
                message: format!(
                    "Step '{}' must name a target object and an external id field",
                    step.name
                ),
            });
        }
        if step.kind.consumes_identifier_map() && !map_published {
            return Err(PipelineError::ValidationFailed {
                message: format!(
                    "Step '{}' consumes an identifier map but no earlier step produces one",
                    step.name
                ),
            });
        }
        map_published |= step.kind.produces_identifier_map();
    }
    Ok(())
}

/// Lifecycle of a single pipeline run. Strictly forward-moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunStatus {
    Idle,
    Running { step_index: usize },
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "idle"),
            RunStatus::Running { step_index } => write!(f, "running(step {})", step_index + 1),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}
