//! Persistence tests that exercise the job store from several threads and
//! across process restarts.

mod common;

use std::sync::Arc;
use std::thread;

use chrono::Utc;
use common::*;
use seqjobs::job::JobDraft;
use seqjobs::{
    Config, DatabaseSpec, Job, JobStatus, JobStore, Orchestrator, SeqjobsError, StoreError,
};

fn draft(id: &str) -> JobDraft {
    JobDraft {
        id: id.to_string(),
        name: format!("job {}", id),
        analyst_name: "demo".to_string(),
        file_id: "file-1".to_string(),
        file_name: "reads.fastq".to_string(),
        database: DatabaseSpec::named("any"),
        output_dir: format!("/out/DEMO_job_{}", id).into(),
        options: Default::default(),
    }
}

#[test]
fn test_concurrent_transitions_are_not_lost() {
    let harness = TestHarness::new();
    let store = Arc::new(harness.job_store());
    for i in 0..8 {
        store
            .create(Job::queued(draft(&format!("job-{}", i)), Utc::now()))
            .unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let id = format!("job-{}", i);
                store.mark_running(&id, Utc::now()).unwrap();
                if i % 2 == 0 {
                    store.complete(&id, vec![], Utc::now()).unwrap();
                } else {
                    store.fail(&id, "odd job out", Utc::now()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // A second handle sees every write.
    let counts = harness.job_store().counts().unwrap();
    assert_eq!(counts.completed, 4);
    assert_eq!(counts.failed, 4);
    assert_eq!(counts.queued + counts.running, 0);
    assert_eq!(counts.total(), 8);
}

#[test]
fn test_terminal_job_rejects_further_transitions() {
    let harness = TestHarness::new();
    let store = harness.job_store();
    store.create(Job::queued(draft("a"), Utc::now())).unwrap();
    store.mark_running("a", Utc::now()).unwrap();
    store.complete("a", vec!["x.txt".to_string()], Utc::now()).unwrap();

    let err = store.fail("a", "late failure", Utc::now()).unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Failed,
            ..
        }
    ));

    let job = store.find("a").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result_files, vec!["x.txt"]);
}

#[test]
fn test_corrupt_history_fails_startup_and_is_preserved() {
    let harness = TestHarness::new();
    let garbage = "{ this is not a job list";
    std::fs::write(harness.jobs_file(), garbage).unwrap();

    let config = Config {
        data_dir: harness.data_dir.clone(),
        ..Config::default()
    };
    let result = Orchestrator::from_config(&config);

    assert!(matches!(
        result,
        Err(SeqjobsError::Store(StoreError::Corrupt { .. }))
    ));
    assert_eq!(std::fs::read_to_string(harness.jobs_file()).unwrap(), garbage);
}

#[test]
fn test_history_survives_reopen() {
    let harness = TestHarness::new();
    {
        let store = harness.job_store();
        store.create(Job::queued(draft("first"), Utc::now())).unwrap();
        store.create(Job::queued(draft("second"), Utc::now())).unwrap();
        store.mark_running("first", Utc::now()).unwrap();
        store.complete("first", vec![], Utc::now()).unwrap();
    }

    let reopened = JobStore::open(harness.jobs_file()).unwrap();
    let ids: Vec<String> = reopened.list_all().unwrap().into_iter().map(|j| j.id).collect();
    assert_eq!(ids, vec!["second", "first"]);
    assert_eq!(
        reopened.find("first").unwrap().unwrap().status,
        JobStatus::Completed
    );
    assert!(!harness.data_dir.join("jobs.json.tmp").exists());
}
