//! Job records and their status lifecycle.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyst::DatabaseSpec;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Status only moves forward; `queued -> failed` skips `running`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields fixed at submission time.
#[derive(Debug, Clone)]
pub struct JobDraft {
    pub id: String,
    pub name: String,
    pub analyst_name: String,
    pub file_id: String,
    pub file_name: String,
    pub database: DatabaseSpec,
    pub output_dir: PathBuf,
    pub options: BTreeMap<String, String>,
}

/// One analysis execution request and its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub name: String,
    /// Registry key of the analyst.
    pub analyst_name: String,
    pub file_id: String,
    pub file_name: String,
    /// Snapshot of the database spec taken at submission.
    pub database: DatabaseSpec,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub output_dir: PathBuf,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result_files: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl Job {
    pub fn queued(draft: JobDraft, at: DateTime<Utc>) -> Self {
        Self {
            id: draft.id,
            name: draft.name,
            analyst_name: draft.analyst_name,
            file_id: draft.file_id,
            file_name: draft.file_name,
            database: draft.database,
            status: JobStatus::Queued,
            message: None,
            output_dir: draft.output_dir,
            submitted_at: at,
            start_time: None,
            last_update: at,
            end_time: None,
            result_files: Vec::new(),
            options: draft.options,
        }
    }

    /// Upper-cased analyst name used in messages and directory names.
    pub fn analyst_label(&self) -> String {
        self.analyst_name.to_uppercase()
    }

    fn transition(
        &mut self,
        next: JobStatus,
        message: String,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if !self.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.message = Some(message);
        self.last_update = at;
        match next {
            JobStatus::Running => self.start_time = Some(at),
            JobStatus::Completed | JobStatus::Failed => self.end_time = Some(at),
            JobStatus::Queued => {}
        }
        Ok(())
    }

    pub fn mark_running(&mut self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let message = format!("Running {} analysis...", self.analyst_label());
        self.transition(JobStatus::Running, message, at)
    }

    pub fn complete(
        &mut self,
        result_files: Vec<String>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let message = format!("{} analysis completed", self.analyst_label());
        self.transition(JobStatus::Completed, message, at)?;
        self.result_files = result_files;
        Ok(())
    }

    /// Records a failure; `cause` appears after the analyst prefix.
    pub fn fail(&mut self, cause: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let message = format!("{} error: {}", self.analyst_label(), cause);
        self.transition(JobStatus::Failed, message, at)
    }
}

/// Directory name `<ANALYST>_job_<id>`, unique per job.
pub fn output_dir_name(analyst_name: &str, job_id: &str) -> String {
    format!("{}_job_{}", analyst_name.to_uppercase(), job_id)
}

/// Default job name `<ANALYST>_Analysis_<YYYY-MM-DDTHH-MM-SS>`.
pub fn default_job_name(analyst_name: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_Analysis_{}",
        analyst_name.to_uppercase(),
        at.format("%Y-%m-%dT%H-%M-%S")
    )
}
