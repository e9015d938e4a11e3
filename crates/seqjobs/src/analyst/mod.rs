//! Analysis backends ("analysts") and the registry that holds them.

pub mod metontiime;
pub mod registry;
pub mod text_stats;
pub mod types;
pub mod validation;

pub use metontiime::MetontiimeAnalyst;
pub use registry::AnalystRegistry;
pub use text_stats::TextStatsAnalyst;
pub use types::{
    AnalysisOutcome, AnalysisParams, AnalystDescriptor, DatabaseSpec, InputKind, InputSpec,
    InputValue, INPUT_FILE, JOB_NAME, OUTPUT_DIR,
};
pub use validation::{validate_inputs, ValidationIssue, ValidationResult};

use crate::error::AnalysisError;

/// Capability set every analysis backend provides.
///
/// Introspection (`required_inputs`, `supported_databases`) must be pure:
/// the registry rejects analysts whose declarations differ between calls.
pub trait Analyst: Send + Sync {
    /// Human-readable name, e.g. `MetONTIIME`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn required_inputs(&self) -> Vec<InputSpec>;

    fn supported_databases(&self) -> Vec<DatabaseSpec>;

    /// Checks the parameters against [`required_inputs`](Self::required_inputs).
    /// Never fails; problems are reported in the result.
    fn validate_params(&self, params: &AnalysisParams) -> ValidationResult {
        validate_inputs(&self.required_inputs(), params)
    }

    /// Runs the analysis. Blocking; called once per job from a worker thread.
    fn analyze(&self, params: &AnalysisParams) -> Result<AnalysisOutcome, AnalysisError>;
}
