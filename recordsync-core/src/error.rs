//! Error types for the recordsync core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering configuration, extraction, transformation, remote-store calls,
//! and pipeline orchestration.
//!
//! Record-level rejections from the remote store are *not* errors here; they
//! are carried as data in [`crate::types::UpsertOutcome`].

use std::path::PathBuf;

/// Top-level error type for the recordsync core library.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },

    #[error("Unknown report '{name}'")]
    UnknownReport { name: String },
}

/// Errors from reading source files into a dataset.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Source directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("No .{extension} files found in the directory: {path}")]
    NoFiles { path: PathBuf, extension: String },

    #[error("Failed to read {path}: {message}")]
    ReadFailed { path: PathBuf, message: String },
}

/// Errors raised by a transformer. Always fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Transformer '{transformer}' failed: {message}")]
    Failed {
        transformer: String,
        message: String,
    },

    #[error("Transformer '{transformer}' requires an identifier map but none was provided")]
    MissingIdentifierMap { transformer: String },
}

/// Call-level failures against the remote store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Request to {object} rejected with HTTP {status}: {body}")]
    Http {
        object: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {object}: {message}")]
    MalformedResponse { object: String, message: String },

    #[error("Upsert to {object} timed out after {timeout_secs}s")]
    Timeout { object: String, timeout_secs: u64 },

    #[error("Logout failed: {message}")]
    Logout { message: String },
}

/// Errors from pipeline definition and execution.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Pipeline validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Step '{step}' consumes an identifier map but no earlier step produced one")]
    MissingIdentifierMap { step: String },

    #[error("Step '{step}' received {outcomes} outcomes for {records} records")]
    OutcomeMismatch {
        step: String,
        records: usize,
        outcomes: usize,
    },

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<SyncError>,
    },
}

/// A type alias for results using the top-level `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;
