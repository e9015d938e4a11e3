use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::analyst::ValidationIssue;
use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum SeqjobsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Submission rejected: {0}")]
    Submit(#[from] SubmitError),

    #[error("Query failed: {0}")]
    Query(#[from] QueryError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Analyst '{name}' violates the analyst contract: {reason}")]
    ContractViolation { name: String, reason: String },

    #[error("Analyst '{0}' is already registered")]
    DuplicateAnalyst(String),

    #[error("Analyst '{0}' is not registered")]
    UnknownAnalyst(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Failure of a single analysis run. Recorded onto the job, never propagated
/// to the submitting caller.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid parameters: {}", join_issues(.0))]
    InvalidParams(Vec<ValidationIssue>),

    #[error("Invalid configuration: {}", .0.join(", "))]
    Configuration(Vec<String>),

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipeline exited with {}{}", describe_code(.code), describe_stderr(.stderr))]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("Timeout: pipeline did not finish within {}s", .limit.as_secs())]
    Timeout { limit: Duration },

    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize analysis output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),

    #[error("analyst panicked: {0}")]
    Panicked(String),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The persisted collection exists but is not a valid record sequence.
    #[error("Store file '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store contents: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Data directory '{path}' is in use by another seqjobs process")]
    Locked { path: PathBuf },

    #[error("Record '{0}' not found")]
    NotFound(String),

    #[error("Record '{0}' already exists")]
    DuplicateId(String),

    #[error("Job '{id}' cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Path is a directory, not a file: {0}")]
    IsDirectory(PathBuf),

    #[error("Unsupported input format '{name}' (accepted: {})", .allowed.join(", "))]
    UnsupportedFormat { name: String, allowed: Vec<String> },

    #[error("Failed to inspect '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Synchronous rejection of a run request. No job record exists when one of
/// these is returned.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid request: {}", join_issues(.issues))]
    InvalidRequest { issues: Vec<ValidationIssue> },

    #[error("Analyst '{0}' is not supported")]
    UnknownAnalyst(String),

    #[error("Upload '{0}' does not exist")]
    UnknownUpload(String),

    #[error("Output directory '{path}' is not usable: {reason}")]
    OutputUnwritable { path: PathBuf, reason: String },

    #[error("Job output directory already exists: {0}")]
    OutputCollision(PathBuf),

    #[error("Orchestrator is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SubmitError {
    /// Names of the inputs reported missing, in declaration order.
    pub fn missing_inputs(&self) -> Vec<&str> {
        match self {
            SubmitError::InvalidRequest { issues } => issues
                .iter()
                .filter_map(|issue| match issue {
                    ValidationIssue::Missing { input } => Some(input.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Invalid result file name: {0}")]
    InvalidFileName(String),

    #[error("Result file '{name}' not found for job '{job_id}'")]
    ResultNotFound { job_id: String, name: String },

    #[error("Failed to read results in '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SeqjobsError>;
