use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver};
use log::{error, info, warn};
use tokio::sync::broadcast;

use super::output::{check_output_root, create_job_dir};
use super::request::{RunRequest, SubmitReceipt};
use super::results::{self, ResultFile};
use super::worker::{WorkItem, WorkerMessage, WorkerPool};
use crate::analyst::{
    AnalysisParams, AnalystRegistry, DatabaseSpec, InputValue, ValidationIssue, INPUT_FILE,
    JOB_NAME, OUTPUT_DIR,
};
use crate::broadcast::{JobEvent, JobEventBroadcaster};
use crate::config::Config;
use crate::error::{QueryError, SeqjobsError, StoreError, SubmitError};
use crate::job::{default_job_name, output_dir_name, Job, JobDraft, JobStatus};
use crate::store::{DataDirLock, JobStore, UploadStore};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accepts run requests, queues them on the worker pool, and answers
/// queries over the persisted job history.
pub struct Orchestrator {
    registry: Arc<AnalystRegistry>,
    jobs: Arc<JobStore>,
    uploads: Arc<UploadStore>,
    events: JobEventBroadcaster,
    pool: WorkerPool,
    reconciler: Mutex<Option<JoinHandle<()>>>,
    _lock: DataDirLock,
}

impl Orchestrator {
    /// Locks the job history's directory, fails any jobs a previous process
    /// left unfinished, and starts the workers.
    ///
    /// Fails with [`StoreError::Locked`] while another orchestrator owns the
    /// directory. Its jobs are left untouched.
    pub fn new(
        registry: AnalystRegistry,
        jobs: JobStore,
        uploads: UploadStore,
        worker_count: usize,
    ) -> Result<Self, StoreError> {
        let lock = DataDirLock::acquire(history_dir(jobs.path()))?;
        let registry = Arc::new(registry);
        let jobs = Arc::new(jobs);
        let events = JobEventBroadcaster::default();

        for job in jobs.recover_interrupted(Utc::now())? {
            events.publish(&job);
        }

        let (message_tx, message_rx) = unbounded();
        let pool = WorkerPool::new(Arc::clone(&registry), worker_count.max(1), message_tx);
        let reconciler = spawn_reconciler(message_rx, Arc::clone(&jobs), events.clone());

        Ok(Self {
            registry,
            jobs,
            uploads: Arc::new(uploads),
            events,
            pool,
            reconciler: Mutex::new(Some(reconciler)),
            _lock: lock,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SeqjobsError> {
        let registry = AnalystRegistry::from_config(&config.analysts)?;
        let jobs = JobStore::open(config.jobs_file())?;
        let uploads = UploadStore::open(config.uploads_file())?;
        Ok(Self::new(registry, jobs, uploads, config.worker_count)?)
    }

    pub fn registry(&self) -> &AnalystRegistry {
        &self.registry
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    /// Validates `request`, allocates the job's output directory, persists
    /// the job as queued, and hands it to a worker.
    ///
    /// On any error no job record exists and no directory is left behind.
    pub fn submit(&self, request: RunRequest) -> Result<SubmitReceipt, SubmitError> {
        if self.pool.is_shutdown() {
            return Err(SubmitError::ShuttingDown);
        }

        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(SubmitError::InvalidRequest { issues: missing });
        }

        let analyst_key = request.analyst_name.trim().to_lowercase();
        let analyst = self
            .registry
            .lookup(&analyst_key)
            .ok_or_else(|| SubmitError::UnknownAnalyst(request.analyst_name.clone()))?;

        let upload = self
            .uploads
            .find(request.file_id.trim())?
            .ok_or_else(|| SubmitError::UnknownUpload(request.file_id.clone()))?;

        let job_id = uuid::Uuid::new_v4().to_string();
        let submitted_at = Utc::now();
        let job_name = request
            .explicit_job_name()
            .map(str::to_string)
            .unwrap_or_else(|| default_job_name(&analyst_key, submitted_at));

        let mut issues = Vec::new();
        let database = resolve_database(&analyst.supported_databases(), &request.database)
            .unwrap_or_else(|issue| {
                issues.push(issue);
                request.database.clone()
            });

        let provisional_dir = request
            .output_root
            .join(output_dir_name(&analyst_key, &job_id));
        let mut params = AnalysisParams::new(&job_id, database.clone());
        for (key, value) in &request.options {
            params.set_input(key, InputValue::Text(value.clone()));
        }
        params.set_input(INPUT_FILE, InputValue::File(upload.clone()));
        params.set_input(OUTPUT_DIR, InputValue::Directory(provisional_dir));
        params.set_input(JOB_NAME, InputValue::Text(job_name.clone()));

        issues.extend(analyst.validate_params(&params).into_issues());
        if !issues.is_empty() {
            return Err(SubmitError::InvalidRequest { issues });
        }

        let root = check_output_root(&request.output_root, &job_id)?;
        let output_dir = create_job_dir(&root, &analyst_key, &job_id)?;
        params.set_input(OUTPUT_DIR, InputValue::Directory(output_dir.clone()));

        let job = Job::queued(
            JobDraft {
                id: job_id.clone(),
                name: job_name.clone(),
                analyst_name: analyst_key.clone(),
                file_id: upload.id.clone(),
                file_name: upload.original_name.clone(),
                database,
                output_dir: output_dir.clone(),
                options: request.options.clone(),
            },
            submitted_at,
        );

        let item = WorkItem {
            job_id: job_id.clone(),
            analyst_name: analyst_key.clone(),
            params,
        };
        let mut persisted = false;
        let enqueued = self.pool.submit_with(item, || {
            self.jobs.create(job.clone())?;
            persisted = true;
            self.events.publish(&job);
            Ok(())
        });
        if let Err(e) = enqueued {
            if persisted {
                self.discard_job(&job_id);
            }
            remove_job_dir(&output_dir);
            return Err(e);
        }

        info!(
            "Queued job {} ({}) for {} on {}",
            job_id, job_name, analyst_key, upload.original_name
        );

        Ok(SubmitReceipt {
            job_id,
            job_name,
            analyst_name: analyst_key,
            status: JobStatus::Queued,
            output_dir,
            message: "Analysis queued".to_string(),
        })
    }

    /// All jobs, most recently submitted first.
    pub fn list_jobs(&self) -> Result<Vec<Job>, QueryError> {
        Ok(self.jobs.list_all()?)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job, QueryError> {
        self.jobs
            .find(job_id)?
            .ok_or_else(|| QueryError::JobNotFound(job_id.to_string()))
    }

    pub fn list_result_files(&self, job_id: &str) -> Result<Vec<ResultFile>, QueryError> {
        let job = self.get_job(job_id)?;
        results::list_result_files(&job.output_dir)
    }

    pub fn result_file_path(&self, job_id: &str, name: &str) -> Result<PathBuf, QueryError> {
        let job = self.get_job(job_id)?;
        results::resolve_result_file(&job, name)
    }

    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Blocks until the job is terminal or `timeout` elapses, then returns
    /// its latest state. The returned job may be non-terminal on timeout.
    pub fn wait_for_job(&self, job_id: &str, timeout: Option<Duration>) -> Result<Job, QueryError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let job = self.get_job(job_id)?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(job);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn discard_job(&self, job_id: &str) {
        if let Err(e) = self.jobs.discard(job_id) {
            error!("Failed to discard unscheduled job {}: {}", job_id, e);
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }

    /// Refuses new submissions, drains queued jobs, and stops all threads.
    pub fn shutdown(&self) {
        self.pool.shutdown();

        let handle = self
            .reconciler
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Job reconciler panicked");
            }
        }
    }
}

/// The analyst's declared database matching `requested`, or the request's own
/// spec when the analyst declares none.
fn resolve_database(
    declared: &[DatabaseSpec],
    requested: &DatabaseSpec,
) -> Result<DatabaseSpec, ValidationIssue> {
    if declared.is_empty() {
        return Ok(requested.clone());
    }

    declared
        .iter()
        .find(|db| db.matches_name(&requested.name))
        .cloned()
        .ok_or_else(|| ValidationIssue::UnsupportedDatabase {
            name: requested.name.clone(),
            supported: declared.iter().map(|db| db.name.clone()).collect(),
        })
}

/// Directory holding the job history file.
fn history_dir(jobs_file: &Path) -> &Path {
    match jobs_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn remove_job_dir(dir: &Path) {
    if let Err(e) = std::fs::remove_dir(dir) {
        warn!("Failed to remove job directory {}: {}", dir.display(), e);
    }
}

/// Single writer for worker-reported transitions. Exits when every worker
/// has dropped its sender.
fn spawn_reconciler(
    messages: Receiver<WorkerMessage>,
    jobs: Arc<JobStore>,
    events: JobEventBroadcaster,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for message in messages {
            let applied = match message {
                WorkerMessage::Started { job_id, at } => jobs.mark_running(&job_id, at),
                WorkerMessage::Finished { job_id, result, at } => match result {
                    Ok(outcome) if outcome.success => {
                        jobs.complete(&job_id, outcome.result_files, at)
                    }
                    Ok(outcome) => jobs.fail(&job_id, &outcome.message, at),
                    Err(cause) => jobs.fail(&job_id, &cause, at),
                },
            };

            match applied {
                Ok(job) => {
                    match job.status {
                        JobStatus::Completed => info!("Job {} completed", job.id),
                        JobStatus::Failed => warn!(
                            "Job {} failed: {}",
                            job.id,
                            job.message.as_deref().unwrap_or_default()
                        ),
                        _ => {}
                    }
                    events.publish(&job);
                }
                Err(e) => error!("Failed to record job transition: {}", e),
            }
        }
    })
}
