use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analyst::{DatabaseSpec, ValidationIssue};
use crate::job::JobStatus;

/// A caller's request to run one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub file_id: String,
    pub analyst_name: String,
    pub database: DatabaseSpec,
    /// Directory under which the job's own output directory is created.
    pub output_root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    /// Extra string inputs passed through to the analyst, e.g. `analysisType`.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl RunRequest {
    pub fn new<P: Into<PathBuf>>(
        file_id: &str,
        analyst_name: &str,
        database: &str,
        output_root: P,
    ) -> Self {
        Self {
            file_id: file_id.to_string(),
            analyst_name: analyst_name.to_string(),
            database: DatabaseSpec::named(database),
            output_root: output_root.into(),
            job_name: None,
            options: BTreeMap::new(),
        }
    }

    pub fn with_job_name(mut self, name: &str) -> Self {
        self.job_name = Some(name.to_string());
        self
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    /// Fields a request cannot be routed without.
    pub(crate) fn missing_fields(&self) -> Vec<ValidationIssue> {
        let fields = [
            ("fileId", self.file_id.trim().is_empty()),
            ("analystName", self.analyst_name.trim().is_empty()),
            ("database", self.database.name.trim().is_empty()),
            ("outputRoot", self.output_root.as_os_str().is_empty()),
        ];

        fields
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(name, _)| ValidationIssue::Missing {
                input: name.to_string(),
            })
            .collect()
    }

    /// Job name given by the caller, if not blank.
    pub(crate) fn explicit_job_name(&self) -> Option<&str> {
        self.job_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Returned once a job has been accepted and queued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: String,
    pub job_name: String,
    pub analyst_name: String,
    pub status: JobStatus,
    pub output_dir: PathBuf,
    pub message: String,
}
