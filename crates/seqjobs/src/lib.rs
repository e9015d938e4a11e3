pub mod analyst;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod sanitize;
pub mod store;
pub mod upload;

pub use analyst::{
    AnalysisOutcome, AnalysisParams, Analyst, AnalystDescriptor, AnalystRegistry, DatabaseSpec,
    InputKind, InputSpec, InputValue, ValidationIssue, ValidationResult,
};
pub use broadcast::{JobEvent, JobEventBroadcaster};
pub use config::{load_config, Config};
pub use error::{
    AnalysisError, ConfigError, QueryError, RegistryError, Result, SeqjobsError, StoreError,
    SubmitError, UploadError,
};
pub use job::{Job, JobStatus};
pub use orchestrator::{Orchestrator, ResultFile, RunRequest, SubmitReceipt};
pub use store::{JobCounts, JobStore, UploadStore};
pub use upload::UploadRecord;
