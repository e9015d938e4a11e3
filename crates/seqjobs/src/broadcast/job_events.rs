//! Job status events for live observers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{Job, JobStatus};

/// A persisted job transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    pub analyst_name: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Snapshot of the job's result files, set on completion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub result_files: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            analyst_name: job.analyst_name.clone(),
            status: job.status,
            message: job.message.clone(),
            result_files: job.result_files.clone(),
            timestamp: job.last_update,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Publishes the current state of `job`.
    pub fn publish(&self, job: &Job) {
        self.send(JobEvent::from_job(job));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for JobEventBroadcaster {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::DatabaseSpec;
    use crate::job::JobDraft;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn job() -> Job {
        Job::queued(
            JobDraft {
                id: "j1".to_string(),
                name: "n".to_string(),
                analyst_name: "example".to_string(),
                file_id: "f".to_string(),
                file_name: "a.txt".to_string(),
                database: DatabaseSpec::named("Built-in Dictionary"),
                output_dir: PathBuf::from("/out"),
                options: BTreeMap::new(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_subscribers_receive_published_events() {
        let broadcaster = JobEventBroadcaster::default();
        let mut rx = broadcaster.subscribe();

        let mut job = job();
        broadcaster.publish(&job);
        job.mark_running(Utc::now()).unwrap();
        broadcaster.publish(&job);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.status, JobStatus::Queued);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.status, JobStatus::Running);
        assert_eq!(second.message.as_deref(), Some("Running EXAMPLE analysis..."));
        assert!(!second.is_terminal());
    }

    #[test]
    fn test_send_without_receivers_is_ignored() {
        let broadcaster = JobEventBroadcaster::new(4);
        assert_eq!(broadcaster.receiver_count(), 0);
        broadcaster.publish(&job());
    }

    #[test]
    fn test_clones_share_channel() {
        let broadcaster = JobEventBroadcaster::default();
        let clone = broadcaster.clone();
        let mut rx = broadcaster.subscribe();
        clone.publish(&job());
        assert_eq!(rx.try_recv().unwrap().job_id, "j1");
    }
}
