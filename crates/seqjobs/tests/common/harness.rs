//! Isolated environment for orchestrator integration tests.
//!
//! Each `TestHarness` owns a temp directory with `data/` (job and upload
//! history), `inputs/` (sequence files), and `outputs/` (output root).

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use seqjobs::{
    Analyst, AnalystRegistry, Job, JobStatus, JobStore, Orchestrator, StoreError, UploadRecord,
    UploadStore,
};

pub const WAIT: Duration = Duration::from_secs(10);

pub struct TestHarness {
    temp_dir: TempDir,
    pub data_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_root: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let data_dir = base.join("data");
        let input_dir = base.join("inputs");
        let output_root = base.join("outputs");

        std::fs::create_dir_all(&data_dir).expect("Failed to create data dir");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");
        std::fs::create_dir_all(&output_root).expect("Failed to create output root");

        Self {
            temp_dir,
            data_dir,
            input_dir,
            output_root,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn jobs_file(&self) -> PathBuf {
        self.data_dir.join("jobs.json")
    }

    pub fn uploads_file(&self) -> PathBuf {
        self.data_dir.join("uploads.json")
    }

    pub fn job_store(&self) -> JobStore {
        JobStore::open(self.jobs_file()).expect("Failed to open job store")
    }

    pub fn upload_store(&self) -> UploadStore {
        UploadStore::open(self.uploads_file()).expect("Failed to open upload store")
    }

    /// Writes `content` to `inputs/<name>` and records it as an upload.
    pub fn upload(&self, name: &str, content: &str) -> UploadRecord {
        let path = self.input_dir.join(name);
        std::fs::write(&path, content).expect("Failed to write input file");
        let record = UploadRecord::from_stored(name, path, content.len() as u64);
        self.upload_store()
            .record(record)
            .expect("Failed to record upload")
    }

    pub fn orchestrator(&self, registry: AnalystRegistry) -> Orchestrator {
        self.orchestrator_with_workers(registry, 1)
    }

    pub fn orchestrator_with_workers(&self, registry: AnalystRegistry, workers: usize) -> Orchestrator {
        self.try_orchestrator(registry, workers)
            .expect("Failed to start orchestrator")
    }

    pub fn try_orchestrator(
        &self,
        registry: AnalystRegistry,
        workers: usize,
    ) -> Result<Orchestrator, StoreError> {
        Orchestrator::new(registry, self.job_store(), self.upload_store(), workers)
    }

    /// Number of entries directly under the output root.
    pub fn output_dir_count(&self) -> usize {
        std::fs::read_dir(&self.output_root)
            .expect("Failed to read output root")
            .count()
    }
}

/// Registry holding the given analysts under their keys.
pub fn registry_with(analysts: Vec<(&str, Arc<dyn Analyst>)>) -> AnalystRegistry {
    let mut registry = AnalystRegistry::new();
    for (name, analyst) in analysts {
        registry
            .register(name, analyst)
            .expect("Failed to register analyst");
    }
    registry
}

pub fn wait_terminal(orchestrator: &Orchestrator, job_id: &str) -> Job {
    let job = orchestrator
        .wait_for_job(job_id, Some(WAIT))
        .expect("Job disappeared");
    assert!(
        job.status.is_terminal(),
        "job {} still {} after {:?}",
        job_id,
        job.status,
        WAIT
    );
    job
}

pub fn wait_status(orchestrator: &Orchestrator, job_id: &str, status: JobStatus) -> Job {
    let deadline = Instant::now() + WAIT;
    loop {
        let job = orchestrator.get_job(job_id).expect("Job disappeared");
        if job.status == status {
            return job;
        }
        assert!(
            Instant::now() < deadline,
            "job {} never reached {} (still {})",
            job_id,
            status,
            job.status
        );
        std::thread::sleep(Duration::from_millis(10));
    }
}
