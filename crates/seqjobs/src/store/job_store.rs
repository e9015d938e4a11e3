//! Persistent job history.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::collection::{JsonCollection, Record};
use crate::error::StoreError;
use crate::job::{Job, JobStatus};

impl Record for Job {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Per-status job totals.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct JobCounts {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobCounts {
    pub fn total(&self) -> usize {
        self.queued + self.running + self.completed + self.failed
    }
}

/// Job history backed by `jobs.json`. Status changes go through
/// [`Job`]'s transition methods so the lifecycle is enforced on write.
pub struct JobStore {
    jobs: JsonCollection<Job>,
}

impl JobStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self {
            jobs: JsonCollection::open(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.jobs.path()
    }

    pub fn create(&self, job: Job) -> Result<(), StoreError> {
        if job.status != JobStatus::Queued {
            return Err(StoreError::InvalidTransition {
                id: job.id.clone(),
                from: JobStatus::Queued,
                to: job.status,
            });
        }
        log::debug!("Persisting job {} ({})", job.id, job.analyst_name);
        self.jobs.insert(job)
    }

    /// Deletes a job that was never handed to a worker. Returns `false` if no
    /// such record exists. Jobs that have left `queued` are history and are
    /// refused.
    pub fn discard(&self, id: &str) -> Result<bool, StoreError> {
        match self.jobs.find(id)? {
            None => return Ok(false),
            Some(job) if job.status != JobStatus::Queued => {
                return Err(StoreError::InvalidTransition {
                    id: job.id,
                    from: job.status,
                    to: JobStatus::Queued,
                })
            }
            Some(_) => {}
        }
        log::debug!("Discarding unscheduled job {}", id);
        self.jobs.remove(id)
    }

    pub fn find(&self, id: &str) -> Result<Option<Job>, StoreError> {
        self.jobs.find(id)
    }

    /// All jobs, most recently submitted first.
    pub fn list_all(&self) -> Result<Vec<Job>, StoreError> {
        self.jobs.list_all()
    }

    pub fn update<F>(&self, id: &str, mutate: F) -> Result<Job, StoreError>
    where
        F: FnOnce(&mut Job) -> Result<(), StoreError>,
    {
        self.jobs.update(id, mutate)
    }

    pub fn mark_running(&self, id: &str, at: DateTime<Utc>) -> Result<Job, StoreError> {
        self.update(id, |job| job.mark_running(at))
    }

    pub fn complete(
        &self,
        id: &str,
        result_files: Vec<String>,
        at: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        self.update(id, move |job| job.complete(result_files, at))
    }

    pub fn fail(&self, id: &str, cause: &str, at: DateTime<Utc>) -> Result<Job, StoreError> {
        self.update(id, |job| job.fail(cause, at))
    }

    /// Fails every job left non-terminal by a previous process.
    pub fn recover_interrupted(&self, at: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        let recovered = self.jobs.update_where(|job| {
            if job.status.is_terminal() {
                return Ok(false);
            }
            job.fail("interrupted before completion", at)?;
            Ok(true)
        })?;

        if !recovered.is_empty() {
            log::warn!(
                "Marked {} interrupted job(s) as failed",
                recovered.len()
            );
        }
        Ok(recovered)
    }

    pub fn counts(&self) -> Result<JobCounts, StoreError> {
        let mut counts = JobCounts::default();
        for job in self.jobs.list_all()? {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}
